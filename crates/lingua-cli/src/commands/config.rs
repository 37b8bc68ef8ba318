use lingua_core::config::QueueConfig;
use lingua_core::UserId;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::config_profiles::{
    default_config_path, is_http_url, normalize_text_option, CliProfile, CliProfilesConfig,
};
use crate::credentials::{resolve_access_token, TokenStore};
use crate::error::CliError;

/// Profile as shown by `config show`; never includes the token itself.
#[derive(Debug, Serialize)]
pub struct ResolvedProfile {
    pub profile: String,
    pub config_path: Option<String>,
    pub api_base_url: Option<String>,
    pub user_id: Option<String>,
    pub access_token_set: bool,
    pub queue: QueueConfig,
}

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            user_id,
            access_token,
            utc_offset_minutes,
            no_activate,
        } => run_config_init(
            global_profile,
            ProfileUpdate {
                api_base_url,
                user_id,
                access_token,
                utc_offset_minutes,
            },
            no_activate,
        ),
        ConfigCommands::Show { json } => run_config_show(global_profile, json),
    }
}

#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub api_base_url: Option<String>,
    pub user_id: Option<String>,
    pub access_token: Option<String>,
    pub utc_offset_minutes: Option<i32>,
}

fn run_config_init(
    profile_name: Option<&str>,
    update: ProfileUpdate,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);

    let access_token = normalize_text_option(update.access_token.clone());
    apply_profile_update(config.profile_mut_or_default(&profile_name), update)?;
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    if let Some(token) = access_token {
        TokenStore::for_profile(&profile_name).save(&token)?;
    }

    println!("Saved profile '{profile_name}' to {}", path.display());
    Ok(())
}

/// Merge explicit values into `profile`, validating each one.
pub fn apply_profile_update(profile: &mut CliProfile, update: ProfileUpdate) -> Result<(), CliError> {
    if let Some(url) = normalize_text_option(update.api_base_url) {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "api base URL must include http:// or https://".to_string(),
            ));
        }
        profile.api_base_url = Some(url.trim_end_matches('/').to_string());
    }

    if let Some(user_id) = normalize_text_option(update.user_id) {
        profile.user_id = Some(UserId::new(user_id)?.as_str().to_string());
    }

    if let Some(offset) = update.utc_offset_minutes {
        let queue = QueueConfig {
            utc_offset_minutes: offset,
            ..profile.queue_config()
        };
        queue.validate()?;
        profile.queue = Some(queue);
    }

    Ok(())
}

fn run_config_show(global_profile: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let resolved = ResolvedProfile {
        config_path: default_config_path()
            .ok()
            .map(|path| path.display().to_string()),
        api_base_url: profile.api_base_url(),
        user_id: profile.user_id(),
        access_token_set: resolve_access_token(&profile_name)?.is_some(),
        queue: profile.queue_config(),
        profile: profile_name,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    let unset = "(not set)";
    println!("Profile:       {}", resolved.profile);
    if let Some(path) = &resolved.config_path {
        println!("Config file:   {path}");
    }
    println!(
        "API base URL:  {}",
        resolved.api_base_url.as_deref().unwrap_or(unset)
    );
    println!("User id:       {}", resolved.user_id.as_deref().unwrap_or(unset));
    println!(
        "Access token:  {}",
        if resolved.access_token_set { "stored" } else { unset }
    );
    println!(
        "Queue:         concurrency {}, retries up to {} ({}s..{}s), UTC offset {} min",
        resolved.queue.max_concurrency,
        resolved.queue.retry.max_attempts,
        resolved.queue.retry.base_delay_secs,
        resolved.queue.retry.max_delay_secs,
        resolved.queue.utc_offset_minutes
    );
    Ok(())
}
