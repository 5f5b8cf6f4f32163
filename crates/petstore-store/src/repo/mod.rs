//! Repository layer mapping `pet` rows to domain records

pub mod pet_repo;

pub use pet_repo::PetRepo;
