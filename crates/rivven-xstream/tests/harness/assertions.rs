//! Assertions over received message sequences

use rivven_xstream::{Message, Scn};

pub trait MessageVecExt {
    /// SCNs in receive order
    fn scns(&self) -> Vec<Scn>;

    /// Commands in receive order
    fn commands(&self) -> Vec<&'static str>;

    /// Panic unless SCNs never decrease
    fn assert_scn_non_decreasing(&self);
}

impl MessageVecExt for [Message] {
    fn scns(&self) -> Vec<Scn> {
        self.iter().map(Message::scn).collect()
    }

    fn commands(&self) -> Vec<&'static str> {
        self.iter().map(Message::command).collect()
    }

    fn assert_scn_non_decreasing(&self) {
        for pair in self.windows(2) {
            assert!(
                pair[0].scn() <= pair[1].scn(),
                "SCN went backwards: {} then {}",
                pair[0],
                pair[1]
            );
        }
    }
}
