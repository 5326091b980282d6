pub mod comments;
pub mod entities;
pub mod favorites;
pub mod guides;
pub mod import;
