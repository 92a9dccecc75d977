use std::rc::Rc;

use derive_more::{Constructor, From, Into, TryUnwrap};

use crate::{ast::NamedResource, interpreter::value::parse_number};

#[derive(Debug, Clone, From, TryUnwrap)]
#[try_unwrap(ref)]
pub enum Primitive {
    Text(Text),
    Number(math::Number),
    Color(Color),
    Variable(data::Variable),
    List(data::ListContents),
    Broadcast(event::BroadcastMenu),
}

#[derive(Debug, Clone, From, Into, Constructor)]
pub struct Text(pub Rc<str>);

/// A `#rrggbb` colour as typed into a colour picker.
#[derive(Debug, Clone, From, Into, Constructor)]
pub struct Color(pub Rc<str>);

impl Color {
    pub fn rgb(&self) -> Option<u32> {
        let hex = self.0.strip_prefix('#')?;
        if hex.len() != 6 {
            return None;
        }
        u32::from_str_radix(hex, 16).ok()
    }
}

pub mod math {
    use super::*;

    /// Any of the numeric slot kinds. Slots accept arbitrary text, so the
    /// literal is kept as typed.
    #[derive(Debug, Clone, From, Into, Constructor)]
    pub struct Number(pub Rc<str>);

    impl Number {
        /// The literal as a number, if it reads as one.
        pub fn value(&self) -> Option<f64> {
            if self.0.trim().is_empty() {
                return None;
            }
            let num = parse_number(&self.0);
            (!num.is_nan()).then_some(num)
        }
    }
}

pub mod data {
    use super::*;

    #[derive(Debug, Clone, From, Into, Constructor)]
    pub struct Variable(pub NamedResource);

    #[derive(Debug, Clone, From, Into, Constructor)]
    pub struct ListContents(pub NamedResource);
}

pub mod event {
    use super::*;

    #[derive(Debug, Clone, From, Into, Constructor)]
    pub struct BroadcastMenu(pub NamedResource);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_keep_non_numeric_text() {
        assert_eq!(math::Number::new("0x1A".into()).value(), Some(26.0));
        assert_eq!(math::Number::new(" 4 ".into()).value(), Some(4.0));
        assert_eq!(math::Number::new("".into()).value(), None);
        assert_eq!(math::Number::new("abc".into()).value(), None);
    }

    #[test]
    fn colors() {
        assert_eq!(Color::new("#ff8000".into()).rgb(), Some(0xff8000));
        assert_eq!(Color::new("ff8000".into()).rgb(), None);
        assert_eq!(Color::new("#fff".into()).rgb(), None);
    }
}
