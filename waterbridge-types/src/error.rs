pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("RFID tag too long: {len} bytes (max: {max} bytes)")]
    TagTooLong {
        len: usize,
        max: usize,
    },

    #[error("Invalid card date: {0}")]
    InvalidDate(String),
}
