//! Database entities.

pub mod appeal;
pub mod appeal_history;
pub mod category;
pub mod category_service;
pub mod comment;
pub mod service;
pub mod service_keywords;
pub mod user;
pub mod user_service;

pub use appeal::Entity as Appeal;
pub use appeal_history::Entity as AppealHistory;
pub use category::Entity as Category;
pub use category_service::Entity as CategoryService;
pub use comment::Entity as Comment;
pub use service::Entity as Service;
pub use service_keywords::Entity as ServiceKeywords;
pub use user::Entity as User;
pub use user_service::Entity as UserService;
