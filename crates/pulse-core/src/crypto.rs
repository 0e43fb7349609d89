//! # 자격증명 암호화 모듈
//!
//! AES-256-GCM을 사용한 자격증명 암호화/복호화 기능을 제공합니다.
//!
//! ## 봉투 형식
//!
//! 모든 자격증명은 버전 태그가 붙은 단일 봉투로 저장됩니다:
//! `{"v": 1, "nonce": base64, "ct": base64}`. 복호화 시 패턴 매칭으로
//! 형식을 추측하지 않으며, 알 수 없는 버전은 명시적 에러입니다.
//!
//! ## 보안 고려사항
//! - 마스터 키는 환경변수 또는 보안 저장소에서 로드
//! - 각 암호화마다 고유한 nonce (12바이트) 사용
//! - 복호화된 평문은 봉투 외부로 직렬화하지 않음

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 암호화 에러.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid master key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),

    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("UTF-8 decode error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("Master key not configured")]
    MasterKeyNotConfigured,
}

/// AES-256-GCM nonce 크기 (바이트)
pub const NONCE_SIZE: usize = 12;

/// AES-256 키 크기 (바이트)
pub const KEY_SIZE: usize = 32;

/// 현재 봉투 버전.
pub const ENVELOPE_VERSION: u8 = 1;

/// 거래소 API 키 묶음 (평문).
///
/// VenueRegistry의 어댑터 생성 과정에서만 일시적으로 존재합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueKeys {
    pub api_key: String,
    pub api_secret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

impl VenueKeys {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: String) -> Self {
        self.passphrase = Some(passphrase);
        self
    }
}

/// SecretString으로 안전하게 변환.
impl From<VenueKeys> for SecretString {
    fn from(keys: VenueKeys) -> Self {
        SecretString::new(serde_json::to_string(&keys).unwrap_or_default().into())
    }
}

/// 버전 태그가 붙은 암호화 봉투.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    /// 봉투 버전
    pub v: u8,
    /// Base64 인코딩된 nonce
    pub nonce: String,
    /// Base64 인코딩된 암호문
    pub ct: String,
}

impl CredentialEnvelope {
    /// JSON 문자열에서 봉투를 파싱합니다.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::MalformedEnvelope(e.to_string()))
    }

    /// JSON 문자열로 직렬화합니다.
    pub fn to_json(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }
}

/// 자격증명 암호화 관리자.
pub struct CredentialEncryptor {
    cipher: Aes256Gcm,
}

impl CredentialEncryptor {
    /// 마스터 키로 암호화 관리자 생성.
    ///
    /// # Arguments
    /// * `master_key` - Base64 인코딩된 32바이트 마스터 키
    ///
    /// # Example
    /// ```ignore
    /// let key = std::env::var("ENCRYPTION_MASTER_KEY")?;
    /// let encryptor = CredentialEncryptor::new(&key)?;
    /// ```
    pub fn new(master_key: &str) -> Result<Self, CryptoError> {
        let key_bytes = Self::decode_key(master_key)?;
        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        Ok(Self { cipher })
    }

    /// Base64로 인코딩된 마스터 키 디코드.
    fn decode_key(master_key: &str) -> Result<Vec<u8>, CryptoError> {
        use base64::Engine;
        let key_bytes = base64::engine::general_purpose::STANDARD.decode(master_key)?;

        if key_bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength(key_bytes.len()));
        }

        Ok(key_bytes)
    }

    /// 랜덤 nonce 생성.
    fn generate_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// 평문을 현재 버전의 봉투로 암호화합니다.
    pub fn seal_str(&self, plaintext: &str) -> Result<CredentialEnvelope, CryptoError> {
        use base64::Engine;

        let nonce_bytes = Self::generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let engine = base64::engine::general_purpose::STANDARD;
        Ok(CredentialEnvelope {
            v: ENVELOPE_VERSION,
            nonce: engine.encode(nonce_bytes),
            ct: engine.encode(ciphertext),
        })
    }

    /// 봉투를 복호화하여 평문을 반환합니다.
    ///
    /// # Errors
    ///
    /// 알 수 없는 버전은 `CryptoError::UnsupportedVersion`으로 거부됩니다.
    pub fn open_str(&self, envelope: &CredentialEnvelope) -> Result<String, CryptoError> {
        use base64::Engine;

        if envelope.v != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion(envelope.v));
        }

        let engine = base64::engine::general_purpose::STANDARD;
        let nonce_bytes = engine.decode(&envelope.nonce)?;
        let ciphertext = engine.decode(&envelope.ct)?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(CryptoError::InvalidNonceLength(nonce_bytes.len()));
        }

        let nonce = Nonce::from_slice(&nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        String::from_utf8(plaintext).map_err(CryptoError::from)
    }

    /// VenueKeys를 암호화하여 JSON 봉투 문자열로 반환합니다.
    pub fn seal_keys(&self, keys: &VenueKeys) -> Result<String, CryptoError> {
        let json = serde_json::to_string(keys)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        self.seal_str(&json)?.to_json()
    }

    /// JSON 봉투 문자열을 복호화하여 VenueKeys를 반환합니다.
    pub fn open_keys(&self, envelope_json: &str) -> Result<VenueKeys, CryptoError> {
        let envelope = CredentialEnvelope::from_json(envelope_json)?;
        let json = self.open_str(&envelope)?;
        serde_json::from_str(&json).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

/// 새로운 마스터 키 생성 (초기 설정용).
///
/// # Example
/// ```
/// let key = pulse_core::crypto::generate_master_key();
/// println!("ENCRYPTION_MASTER_KEY={}", key);
/// ```
pub fn generate_master_key() -> String {
    use base64::Engine;
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    base64::engine::general_purpose::STANDARD.encode(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_encryptor() -> CredentialEncryptor {
        let key = generate_master_key();
        CredentialEncryptor::new(&key).unwrap()
    }

    #[test]
    fn test_seal_open_keys() {
        let encryptor = test_encryptor();
        let keys = VenueKeys::new("api_key_123".to_string(), "secret_456".to_string())
            .with_passphrase("pass_789".to_string());

        let envelope_json = encryptor.seal_keys(&keys).unwrap();
        // 봉투에는 평문이 절대 포함되지 않음
        assert!(!envelope_json.contains("api_key_123"));
        assert!(!envelope_json.contains("secret_456"));

        let opened = encryptor.open_keys(&envelope_json).unwrap();
        assert_eq!(opened.api_key, keys.api_key);
        assert_eq!(opened.api_secret, keys.api_secret);
        assert_eq!(opened.passphrase, keys.passphrase);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let encryptor = test_encryptor();
        let keys = VenueKeys::new("k".to_string(), "s".to_string());

        let envelope_json = encryptor.seal_keys(&keys).unwrap();
        let mut envelope = CredentialEnvelope::from_json(&envelope_json).unwrap();
        envelope.v = 2;

        let result = encryptor.open_str(&envelope);
        assert!(matches!(result, Err(CryptoError::UnsupportedVersion(2))));
    }

    #[test]
    fn test_invalid_key_length() {
        use base64::Engine;
        let short_key = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let result = CredentialEncryptor::new(&short_key);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength(16))));
    }

    #[test]
    fn test_wrong_key_fails() {
        let encryptor_a = test_encryptor();
        let encryptor_b = test_encryptor();
        let keys = VenueKeys::new("k".to_string(), "s".to_string());

        let envelope_json = encryptor_a.seal_keys(&keys).unwrap();
        let result = encryptor_b.open_keys(&envelope_json);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_generate_master_key() {
        let key1 = generate_master_key();
        let key2 = generate_master_key();

        // 키가 서로 다름 (랜덤)
        assert_ne!(key1, key2);

        // 생성된 키로 encryptor 생성 가능
        assert!(CredentialEncryptor::new(&key1).is_ok());
    }
}
