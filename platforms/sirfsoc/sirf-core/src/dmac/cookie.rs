//! Transfer cookies.
//!
//! Every submitted transfer is identified by a cookie drawn from a per-channel
//! counter. Cookies are compared against the channel's "last used" and "last
//! completed" cookies to determine whether a transfer has completed, taking
//! wraparound into account.
use core::fmt;

/// Identifies a submitted transfer on its channel.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Cookie(i32);

/// The state of a submitted transfer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    /// The transfer completed.
    Complete,
    /// The transfer is queued or running.
    InProgress,
    /// The transfer is not complete and its channel is paused.
    Paused,
}

#[derive(Debug)]
pub(crate) struct Cookies {
    last_used: i32,
    last_complete: i32,
}

// === impl Cookie ===

impl Cookie {
    /// The smallest cookie ever assigned.
    pub const MIN: i32 = 1;

    /// Returns the cookie's raw value.
    #[must_use]
    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// === impl Cookies ===

impl Cookies {
    pub(crate) const fn new() -> Self {
        Self {
            last_used: Cookie::MIN,
            last_complete: Cookie::MIN,
        }
    }

    /// Returns the next cookie, wrapping back to [`Cookie::MIN`].
    pub(crate) fn assign(&mut self) -> Cookie {
        let mut next = self.last_used.wrapping_add(1);
        if next < Cookie::MIN {
            next = Cookie::MIN;
        }
        self.last_used = next;
        Cookie(next)
    }

    pub(crate) fn complete(&mut self, cookie: Cookie) {
        self.last_complete = cookie.0;
    }

    pub(crate) fn is_complete(&self, Cookie(cookie): Cookie) -> bool {
        let (complete, used) = (self.last_complete, self.last_used);
        if complete <= used {
            cookie <= complete || cookie > used
        } else {
            cookie <= complete && cookie > used
        }
    }

    #[cfg(test)]
    pub(crate) fn with_last_used(last_used: i32) -> Self {
        Self {
            last_used,
            last_complete: last_used,
        }
    }
}
