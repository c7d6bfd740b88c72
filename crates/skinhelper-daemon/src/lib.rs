pub mod host;
pub mod input;
pub mod monitor;
pub mod rpc;
pub mod search;
pub mod socket;
pub mod watch;
