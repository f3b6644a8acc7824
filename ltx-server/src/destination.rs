//! Validation and decomposition of user-supplied GCS destinations.
//!
//! A destination must look like `gs://bucket/path/to/video.mp4`. The
//! parser is pure: a valid string always decomposes the same way and a
//! malformed one is rejected with the specific reason, never defaulted.

pub const GCS_SCHEME: &str = "gs://";
const MP4_SUFFIX: &str = ".mp4";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsDestination {
    pub bucket: String,
    pub object: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationError {
    #[error("GCS destination must start with 'gs://'")]
    MissingScheme,
    #[error("GCS destination must end with '.mp4'")]
    MissingSuffix,
    #[error("invalid bucket name '{0}': expected 3+ lowercase alphanumeric characters with interior hyphens/underscores")]
    InvalidBucket(String),
    #[error("GCS destination must include an object path after the bucket")]
    MissingObjectPath,
    #[error("GCS object path must not contain whitespace")]
    WhitespaceInPath,
}

impl GcsDestination {
    /// Validate `raw` and split it into bucket and object path.
    pub fn parse(raw: &str) -> Result<Self, DestinationError> {
        let rest = raw
            .strip_prefix(GCS_SCHEME)
            .ok_or(DestinationError::MissingScheme)?;
        if !rest.ends_with(MP4_SUFFIX) {
            return Err(DestinationError::MissingSuffix);
        }
        // `gs://bucket.mp4` has no object path; a bare bucket cannot
        // carry the required suffix, so the form is rejected outright.
        let (bucket, object) = rest
            .split_once('/')
            .ok_or(DestinationError::MissingObjectPath)?;
        if !valid_bucket(bucket) {
            return Err(DestinationError::InvalidBucket(bucket.to_string()));
        }
        if object.len() == MP4_SUFFIX.len() {
            return Err(DestinationError::MissingObjectPath);
        }
        if object.chars().any(char::is_whitespace) {
            return Err(DestinationError::WhitespaceInPath);
        }
        Ok(Self {
            bucket: bucket.to_string(),
            object: object.to_string(),
        })
    }

    pub fn uri(&self) -> String {
        format!("{GCS_SCHEME}{}/{}", self.bucket, self.object)
    }
}

fn valid_bucket(bucket: &str) -> bool {
    let bytes = bucket.as_bytes();
    if bytes.len() < 3 {
        return false;
    }
    let alnum = |c: u8| c.is_ascii_lowercase() || c.is_ascii_digit();
    alnum(bytes[0])
        && alnum(bytes[bytes.len() - 1])
        && bytes.iter().all(|&c| alnum(c) || c == b'-' || c == b'_')
}
