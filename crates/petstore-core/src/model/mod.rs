pub mod pet;
pub mod value;

pub use pet::{Pet, PetColumn, PetId, NAME_MAX_LEN};
pub use value::Value;
