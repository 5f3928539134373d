//! HTTP implementation of the backend admin API

mod client;

pub(crate) use client::HttpAdminClient;
