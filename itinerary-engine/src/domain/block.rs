//! Timeline blocks: the ordered mix of stops and synthesized moves.

use super::{Item, Link};

/// One entry of a day's display timeline.
///
/// Stops sit at integer orders (their index in the day); moves sit halfway
/// between the two stops they connect, so sorting by [`order`](Self::order)
/// reproduces the visual sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimelineBlock<'a> {
    Stop { item: &'a Item, order: f64 },
    Move { link: &'a Link },
}

impl<'a> TimelineBlock<'a> {
    pub fn order(&self) -> f64 {
        match self {
            TimelineBlock::Stop { order, .. } => *order,
            TimelineBlock::Move { link } => link.order,
        }
    }

    pub fn as_stop(&self) -> Option<&'a Item> {
        match self {
            TimelineBlock::Stop { item, .. } => Some(item),
            TimelineBlock::Move { .. } => None,
        }
    }

    pub fn as_move(&self) -> Option<&'a Link> {
        match self {
            TimelineBlock::Stop { .. } => None,
            TimelineBlock::Move { link } => Some(link),
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, TimelineBlock::Move { .. })
    }
}
