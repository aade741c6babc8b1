//! Effective transfer settings: CLI flags over file config over defaults.

use std::path::PathBuf;
use std::time::Duration;

use multporn_core::download::{
    DEFAULT_OUTPUT_DIR, EngineOptions, RetryPolicy, SkippedPolicy, TransportConfig,
};

use crate::app_config::FileConfig;
use crate::cli::TransferArgs;

#[derive(Debug, Clone)]
pub(crate) struct TransferSettings {
    pub output_dir: PathBuf,
    pub transport: TransportConfig,
    pub engine: EngineOptions,
}

impl TransferSettings {
    pub(crate) fn resolve(args: &TransferArgs, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        let defaults = TransportConfig::default();
        let default_policy = RetryPolicy::default();

        let output_dir = args
            .output_dir
            .clone()
            .or(file.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let total = args
            .max_retries
            .or(file.max_retries)
            .unwrap_or(default_policy.total());
        let mut retry_policy = RetryPolicy::with_total(total);
        if let Some(ms) = args.backoff_factor_ms.or(file.backoff_factor_ms) {
            retry_policy = retry_policy.backoff_factor(Duration::from_millis(ms));
        }

        let transport = TransportConfig {
            connect_timeout: args
                .connect_timeout
                .or(file.connect_timeout_secs)
                .map_or(defaults.connect_timeout, Duration::from_secs),
            read_timeout: args
                .read_timeout
                .or(file.read_timeout_secs)
                .map_or(defaults.read_timeout, Duration::from_secs),
            retry_policy,
            user_agent: None,
            use_env_proxy: !args.no_proxy && file.use_env_proxy.unwrap_or(true),
        };

        let skipped_policy = if args.retry_skipped || file.retry_skipped.unwrap_or(false) {
            SkippedPolicy::Retry
        } else {
            SkippedPolicy::Keep
        };
        let engine = EngineOptions {
            concurrency: args
                .concurrency
                .or(file.concurrency)
                .unwrap_or(EngineOptions::default().concurrency),
            skipped_policy,
        };

        Self {
            output_dir,
            transport,
            engine,
        }
    }
}
