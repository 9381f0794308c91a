//! Chat relay core library: config, completion client, LINE channel and the HTTP gateway
//! used by the `chatrelay` CLI.

pub mod channels;
pub mod config;
pub mod gateway;
pub mod init;
pub mod llm;
