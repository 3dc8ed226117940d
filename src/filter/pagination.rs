use super::params::QueryParams;
use super::types::PageRequest;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

pub const PAGE_SIZE_PARAM: &str = "pageSize";
pub const PAGE_PARAM: &str = "page";

/// Effective page size. Never fails: missing or zero falls back to the default, a usable
/// value strictly below the maximum is kept, anything else present clamps to the maximum.
pub fn page_size(requested: Option<&str>, default_size: u32, max_size: u32) -> u32 {
    let Some(raw) = requested.map(str::trim).filter(|s| !s.is_empty()) else {
        return default_size;
    };

    match leading_integer(raw) {
        Some(0) => default_size,
        Some(n) if n > 0 && n < i64::from(max_size) => u32::try_from(n).unwrap_or(max_size),
        _ => {
            tracing::debug!("Requested page size '{}' clamped to {}", raw, max_size);
            max_size
        }
    }
}

/// Integer prefix of a loosely numeric value: `12.5` and `12abc` both read as 12.
fn leading_integer(raw: &str) -> Option<i64> {
    let sign = usize::from(raw.starts_with(|c: char| c == '-' || c == '+'));
    let end = raw[sign..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(raw.len(), |i| i + sign);
    if end == sign {
        return None;
    }
    raw[..end].parse().ok()
}

/// 1-based page number; anything unusable is page 1.
pub fn page_number(requested: Option<&str>) -> u32 {
    requested
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

pub fn resolve(params: &QueryParams, default_size: u32, max_size: u32) -> PageRequest {
    PageRequest {
        size: page_size(params.get_str(PAGE_SIZE_PARAM), default_size, max_size),
        number: page_number(params.get_str(PAGE_PARAM)),
    }
}
