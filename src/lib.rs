use std::sync::Arc;

use handlebars::Handlebars;

pub mod access_log;
pub mod api_models;
pub mod config;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;
pub mod voting;

use crate::config::Config;
use crate::store::PollStore;
use crate::voting::VotingService;

/**
 * Struct for carrying application state into tide request handlers
 */
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PollStore>,
    pub voting: VotingService,
    pub templates: Arc<Handlebars<'static>>,
    pub config: Arc<Config>,
}

impl AppState {
    /**
     * Wire up the state, loading every `.hbs` file under the configured
     * template directory
     */
    pub fn new(store: Arc<dyn PollStore>, config: Config) -> Result<Self, handlebars::TemplateFileError> {
        let mut templates = Handlebars::new();
        templates.register_templates_directory(".hbs", &config.template_dir)?;

        Ok(Self {
            voting: VotingService::new(store.clone()),
            store,
            templates: Arc::new(templates),
            config: Arc::new(config),
        })
    }
}

/**
 * Build the tide application with every route registered
 */
pub fn app(state: AppState) -> tide::Server<AppState> {
    let mut app = tide::with_state(state);
    app.with(access_log::ApacheCombinedLogger::new());

    app.at("/").get(routes::polls::index);
    app.at("/polls/:id").get(routes::polls::detail);
    app.at("/polls/:id/vote").post(routes::polls::vote);
    app.at("/polls/:id/results").get(routes::polls::results);

    app.at("/api/v1/polls").get(routes::api::list);
    app.at("/api/v1/polls").put(routes::api::create);
    app.at("/api/v1/polls/:id").get(routes::api::get);
    app.at("/api/v1/polls/:id/vote").post(routes::api::vote);
    app.at("/api/v1/polls/:id/results").get(routes::api::results);
    app
}
