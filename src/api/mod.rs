pub mod credential;
pub mod headers;
pub mod run;
pub mod session;
pub mod ui;

pub use credential::{
    handle_clear_credential, handle_get_credential, handle_set_credential, CredentialRequest,
    CredentialStatus, __path_handle_clear_credential, __path_handle_get_credential,
    __path_handle_set_credential,
};
pub use headers::{SessionQuery, SESSION_HEADER};
pub use run::{
    handle_download, handle_events, handle_get_run, handle_reset, handle_share, handle_submit,
    SubmitRequest, __path_handle_download, __path_handle_events, __path_handle_get_run,
    __path_handle_reset, __path_handle_share, __path_handle_submit,
};
pub use session::{handle_new_session, SessionResponse, __path_handle_new_session};
pub use ui::handle_asset;
