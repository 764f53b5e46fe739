//! Business logic services.

#![allow(missing_docs)]

pub mod aggregate;
pub mod appeal;
pub mod classifier;
pub mod directory;
pub mod notification;
pub mod permissions;
pub mod settings;
pub mod statistics;

pub use appeal::{
    AppealService, AssignInput, ClassifyResult, CommentInput, CreateAppealInput,
    UpdateAppealInput, UpdatePriorityInput, UpdateStatusInput,
};
pub use classifier::{Classification, Classifier, ClassifierService, HttpClassifier, NoOpClassifier};
pub use directory::{
    AssignCategoryServicesInput, CategoryWithServices, ClassificationEntry, CreateCategoryInput,
    CreateServiceInput, DirectoryService, KeywordsInput, LinkExecutorInput, UpdateCategoryInput,
    UpdateServiceInput,
};
pub use notification::{
    AppealEvent, LogSink, NoOpSink, Notification, NotificationKind, NotificationSink,
    NotificationSinkService, Notifier,
};
pub use permissions::{AccessContext, Actor, Operation, authorize, permits};
pub use settings::{
    FileSettingsProvider, SettingsProvider, SettingsService, StaticSettings, SystemSettings,
};
pub use statistics::{DateRange, StatisticsService};
