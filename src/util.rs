use std::net::{IpAddr, Ipv4Addr};

const DEFAULT_LISTEN_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

const DEFAULT_LISTEN_PORT: u16 = 9102;

const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const DEFAULT_DATABASE_HOST: &str = "127.0.0.1";

const DEFAULT_DATABASE_PORT: u16 = 5432;

const DEFAULT_POOL_SIZE: u32 = 10;

const DEFAULT_QUERY_INTERVAL_MINUTES: u64 = 1;

pub fn get_default_listen_addr() -> IpAddr {
    DEFAULT_LISTEN_ADDR
}

pub fn get_default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

pub fn get_default_query_timeout() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

pub fn get_default_database_host() -> String {
    String::from(DEFAULT_DATABASE_HOST)
}

pub fn get_default_database_port() -> u16 {
    DEFAULT_DATABASE_PORT
}

pub fn get_default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

pub fn get_default_query_interval() -> u64 {
    DEFAULT_QUERY_INTERVAL_MINUTES
}

/// Replaces every character of a secret with `*`, keeping its length visible.
pub fn mask_secret(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
