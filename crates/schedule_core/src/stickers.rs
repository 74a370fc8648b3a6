use std::collections::BTreeMap;

use crate::date_math::DayInt;

/// Decorative stickers pinned to calendar days, at most one per day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StickerBoard {
    stickers: BTreeMap<DayInt, String>,
}

impl StickerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `sticker` to `day`, returning the sticker it replaced.
    pub fn set(&mut self, day: DayInt, sticker: impl Into<String>) -> Option<String> {
        self.stickers.insert(day, sticker.into())
    }

    pub fn clear(&mut self, day: DayInt) -> Option<String> {
        self.stickers.remove(&day)
    }

    pub fn get(&self, day: DayInt) -> Option<&str> {
        self.stickers.get(&day).map(String::as_str)
    }

    /// Stickers in calendar order.
    pub fn iter(&self) -> impl Iterator<Item = (DayInt, &str)> {
        self.stickers.iter().map(|(day, sticker)| (*day, sticker.as_str()))
    }

    pub fn len(&self) -> usize {
        self.stickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }
}

impl FromIterator<(DayInt, String)> for StickerBoard {
    fn from_iter<I: IntoIterator<Item = (DayInt, String)>>(iter: I) -> Self {
        Self {
            stickers: iter.into_iter().collect(),
        }
    }
}
