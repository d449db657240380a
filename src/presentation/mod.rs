pub mod cli;
pub mod dispatcher;
