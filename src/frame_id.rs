use std::fmt::{Display, Formatter};

/// The sender assigns frame ids sequentially starting at 0, so ids double as playout order.
///
/// NB: At video frame rates a u32 outlasts any plausible session by orders of magnitude, so
///  there is no wrap-around handling.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct FrameId(u32);

impl Display for FrameId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FrameId {
    pub const ZERO: FrameId = FrameId(0);

    pub fn from_raw(value: u32) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u32 {
        self.0
    }

    pub fn next(&self) -> FrameId {
        FrameId(
            self.0.checked_add(1)
                .expect("frame id overflow")
        )
    }

    /// The number of frames in `[self, other)`; `None` if `other` is below `self`.
    pub fn distance_to(&self, other: FrameId) -> Option<u32> {
        other.0.checked_sub(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next() {
        assert_eq!(FrameId::ZERO.next(), FrameId::from_raw(1));
        assert_eq!(FrameId::from_raw(41).next(), FrameId::from_raw(42));
    }

    #[test]
    fn test_distance_to() {
        assert_eq!(FrameId::from_raw(3).distance_to(FrameId::from_raw(7)), Some(4));
        assert_eq!(FrameId::from_raw(3).distance_to(FrameId::from_raw(3)), Some(0));
        assert_eq!(FrameId::from_raw(3).distance_to(FrameId::from_raw(2)), None);
    }

    #[test]
    fn test_ordering() {
        assert!(FrameId::from_raw(3) < FrameId::from_raw(4));
        assert_eq!(FrameId::from_raw(17).to_raw(), 17);
    }
}
