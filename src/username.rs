//! Generated usernames and blog slugs.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn base36(mut value: u64, width: usize) -> String {
    let mut out = vec![b'0'; width];
    for slot in out.iter_mut().rev() {
        *slot = BASE36[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8(out).unwrap_or_default()
}

fn random_base36(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| BASE36[rng.random_range(0..36)] as char)
        .collect()
}

/// Generate a username of the form `user-<timestamp><random>`.
/// Fits the 2-20 character `[A-Za-z0-9_-]` username rules.
pub fn generate_username() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("user-{}{}", base36(now, 6), random_base36(6))
}

/// Generate a URL slug from a blog title, with a random suffix so equal
/// titles never collide on the unique slug column.
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    format!("{}-{}", slug, random_base36(6))
}
