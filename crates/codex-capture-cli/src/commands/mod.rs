pub mod history;
pub mod latest;
pub mod show;
pub mod status;

pub use history::HistoryCommand;
pub use latest::LatestCommand;
pub use show::ShowCommand;
pub use status::StatusCommand;
