//! Request validation helpers shared by the resource routes.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::AppError;

/// Prefix every Tailscale node key carries.
pub const NODE_KEY_PREFIX: &str = "nodekey:";

/// Strip angle brackets and surrounding whitespace.
pub fn sanitize_input(input: &str) -> String {
    input.replace(['<', '>'], "").trim().to_owned()
}

/// Parse a strictly positive decimal id with no sign, padding or leading zeros.
pub fn parse_positive_id(raw: &str) -> Option<u64> {
    let id: u64 = raw.parse().ok()?;
    (id > 0 && id.to_string() == raw).then_some(id)
}

/// Parse a path id, answering 400 with `what` in the message otherwise.
///
/// # Errors
///
/// Returns [`AppError::BadRequest`] when `raw` is not a positive integer.
pub fn require_id(raw: &str, what: &str) -> Result<u64, AppError> {
    parse_positive_id(raw).ok_or_else(|| AppError::BadRequest {
        code: "invalid_id",
        message: format!("{what} ID must be a positive integer"),
    })
}

pub fn is_valid_node_key(key: &str) -> bool {
    key.starts_with(NODE_KEY_PREFIX)
}

/// Whether `cidr` is an IPv4 or IPv6 network in `addr/prefix` form.
pub fn is_valid_cidr(cidr: &str) -> bool {
    let Some((addr, prefix)) = cidr.split_once('/') else {
        return false;
    };
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    if addr.parse::<Ipv4Addr>().is_ok() {
        prefix <= 32
    } else if addr.parse::<Ipv6Addr>().is_ok() {
        prefix <= 128
    } else {
        false
    }
}

/// Collect the names of fields that are absent or blank.
///
/// # Errors
///
/// Returns [`AppError::MissingFields`] listing every missing field in order.
pub fn require_fields(fields: &[(&'static str, Option<&str>)]) -> Result<(), AppError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::MissingFields(missing))
    }
}
