use {
    std::{
        error::Error,
        fmt::{Display, Formatter},
        io,
    },
    uapi::{
        Errno,
        c::{self, c_int},
    },
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OsError(pub c::c_int);

impl From<Errno> for OsError {
    fn from(e: Errno) -> Self {
        Self(e.0)
    }
}

impl From<c::c_int> for OsError {
    fn from(v: c_int) -> Self {
        Self(v)
    }
}

impl From<io::Error> for OsError {
    fn from(v: io::Error) -> Self {
        Self(v.raw_os_error().unwrap_or(c::EIO))
    }
}

impl Error for OsError {}

impl Display for OsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let msg = io::Error::from_raw_os_error(self.0);
        let msg = msg.to_string();
        let msg = match msg.find(" (os error") {
            Some(idx) => &msg[..idx],
            None => &msg,
        };
        write!(f, "{} (os error {})", msg, self.0)
    }
}
