use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

/// Key a non-member presents to enter a private room.
pub fn generate_join_key(room_id: &str, password: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(room_id.as_bytes());

    if let Some(pass) = password {
        hasher.update(b":");
        hasher.update(pass.as_bytes());
    }

    BASE64.encode(hasher.finalize())
}

pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

pub fn random_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_key_depends_on_password() {
        let open = generate_join_key("room-1", None);
        let locked = generate_join_key("room-1", Some("hunter2"));
        assert_ne!(open, locked);
        assert_eq!(locked, generate_join_key("room-1", Some("hunter2")));
    }

    #[test]
    fn random_secret_has_requested_length() {
        let secret = random_secret(32);
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
