use crate::{config::AppConfig, cookies::CookieCodec, db::DbPool, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub cookies: CookieCodec,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let store = Store::new(db, config.store.clone());
        let cookies = CookieCodec::new(&config.cookie_secret);
        Self {
            config,
            store,
            cookies,
        }
    }
}
