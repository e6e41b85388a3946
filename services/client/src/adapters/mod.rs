pub mod cognito;
pub mod http_api;
pub mod token_file;

pub use cognito::CognitoAdapter;
pub use http_api::HttpTasksAdapter;
pub use token_file::FileTokenStore;
