//! Collection of APs that corresponds with DF (Dedicated File) in the card

pub mod attributes;
pub mod crypto;
pub mod text;
pub mod visual;

pub use self::attributes::{Attributes, Sex};
pub use self::crypto::CryptoAp;
pub use self::text::TextAp;
pub use self::visual::VisualAp;

macro_rules! open {
    ($df: expr) => {
        /// Opens the AP in the card by selecting the DF.
        pub fn open(card: Rc<crate::Card<T>>) -> crate::Result<Self> {
            card.select_df(&$df)?;

            Ok(Self { card })
        }
    };
}

pub(crate) use open;
