use thiserror::Error;

/// Errors generated by the rotating log writer.
#[derive(Debug, Error)]
pub enum Error {
    /// Error generated resolving the system timezone.
    #[error(transparent)]
    Timezone(#[from] time_tz::system::Error),

    /// Error generated parsing a time format description.
    #[error(transparent)]
    InvalidFormat(#[from] time::error::InvalidFormatDescription),

    /// Error generated formatting a timestamp.
    #[error(transparent)]
    TimeFormat(#[from] time::error::Format),

    /// Error generated adjusting a timestamp to the next
    /// rotation boundary.
    #[error(transparent)]
    ComponentRange(#[from] time::error::ComponentRange),

    /// Error generated by input/output.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
