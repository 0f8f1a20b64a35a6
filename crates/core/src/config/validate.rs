use super::{types::Config, ConfigError};
use crate::transcoder::EncodeTarget;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Reaper interval, chunk size and job timeout are not 0
/// - Library depth is not 0
/// - Background and foreground codecs fit their containers
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.library.max_depth == 0 {
        return Err(ConfigError::ValidationError(
            "library.max_depth cannot be 0".to_string(),
        ));
    }

    let transcode = &config.transcode;
    if transcode.reap_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "transcode.reap_interval_ms cannot be 0".to_string(),
        ));
    }
    if transcode.chunk_size == 0 {
        return Err(ConfigError::ValidationError(
            "transcode.chunk_size cannot be 0".to_string(),
        ));
    }
    if transcode.job_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcode.job_timeout_secs cannot be 0".to_string(),
        ));
    }

    validate_target("transcode.background", &transcode.background)?;
    validate_target("transcode.foreground", &transcode.foreground)?;

    Ok(())
}

fn validate_target(name: &str, target: &EncodeTarget) -> Result<(), ConfigError> {
    if !target.codec.fits(target.container) {
        return Err(ConfigError::ValidationError(format!(
            "{}: codec {:?} cannot be stored in container {}",
            name, target.codec, target.container
        )));
    }
    Ok(())
}
