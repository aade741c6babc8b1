//! CLI command handlers.

mod download;
mod info;
mod listing;
mod progress;
mod search;
mod settings;

pub(crate) use download::run_download_command;
pub(crate) use info::run_info_command;
pub(crate) use listing::run_listing_command;
pub(crate) use search::run_search_command;
pub(crate) use settings::TransferSettings;
