//! Bidder bootstrap: turns a validated configuration into running
//! controllers and a route table.
//!
//! # Responsibilities
//! - Build one interceptor controller per request kind from the registries
//! - Bind receivers to routes with their required features
//! - Start and stop controllers together
//! - Swap runtime settings when the configuration reloads

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{
    shared_settings, validate_config, BidderConfig, ConfigError, SharedSettings,
};
use crate::exchange::Exchange;
use crate::interceptor::{
    BidController, ClickController, ImpressionController, LifecycleError, MatchController,
    Registries, RegistryError,
};
use crate::lifecycle::State;
use crate::price::{KeyError, PriceCodec};
use crate::receiver::{
    BidMapper, BidReceiver, ClickReceiver, ControllerInfo, HealthReceiver, ImpressionReceiver,
    JsonBidMapper, MatchReceiver, StatusReceiver,
};
use crate::routing::{Feature, Route, RouteError, Router};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error("invalid price key: {0}")]
    PriceKey(#[from] KeyError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("unknown exchange {0:?}")]
    UnknownExchange(String),
}

/// Lifecycle operations shared by the four controller types.
trait Managed: Send + Sync {
    fn name(&self) -> &str;
    fn begin_start(&self) -> Result<(), LifecycleError>;
    fn await_running(&self) -> Result<(), LifecycleError>;
    fn begin_stop(&self);
    fn await_terminated(&self) -> State;
}

macro_rules! impl_managed {
    ($($controller:ty),*) => {$(
        impl Managed for Arc<$controller> {
            fn name(&self) -> &str {
                <$controller>::name(self)
            }

            fn begin_start(&self) -> Result<(), LifecycleError> {
                self.start_async()
            }

            fn await_running(&self) -> Result<(), LifecycleError> {
                <$controller>::await_running(self)
            }

            fn begin_stop(&self) {
                self.stop_async()
            }

            fn await_terminated(&self) -> State {
                <$controller>::await_terminated(self)
            }
        }
    )*};
}

impl_managed!(BidController, ImpressionController, ClickController, MatchController);

/// The assembled bidder, ready to be served by an `HttpServer`.
pub struct BidderApp {
    config: BidderConfig,
    settings: SharedSettings,
    router: Arc<Router>,
    bid: Arc<BidController>,
    impression: Arc<ImpressionController>,
    click: Arc<ClickController>,
    matching: Arc<MatchController>,
}

impl BidderApp {
    pub fn from_config(config: BidderConfig, registries: &Registries) -> Result<Self, StartupError> {
        Self::from_config_with_mapper(config, registries, Arc::new(JsonBidMapper))
    }

    /// Like [`BidderApp::from_config`] with a custom bid response mapping.
    pub fn from_config_with_mapper(
        config: BidderConfig,
        registries: &Registries,
        mapper: Arc<dyn BidMapper>,
    ) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let codec = price_codec(&config)?;
        let settings = shared_settings(config.runtime_settings());
        let exchange_for = |override_id: &Option<String>| {
            let id = override_id.as_deref().unwrap_or(&config.exchange);
            Exchange::by_id(id).ok_or_else(|| StartupError::UnknownExchange(id.to_string()))
        };

        let bid = BidController::new("bid", registries.bid.create_all(&config.bid.interceptors)?);
        let impression = ImpressionController::new(
            "impression",
            registries.impression.create_all(&config.impression.interceptors)?,
        );
        let click =
            ClickController::new("click", registries.click.create_all(&config.click.interceptors)?);
        let matching = MatchController::new(
            "match",
            registries.matching.create_all(&config.matching.interceptors)?,
        );

        let infos: Vec<Arc<dyn ControllerInfo>> = vec![
            Arc::clone(&bid) as Arc<dyn ControllerInfo>,
            Arc::clone(&impression) as Arc<dyn ControllerInfo>,
            Arc::clone(&click) as Arc<dyn ControllerInfo>,
            Arc::clone(&matching) as Arc<dyn ControllerInfo>,
        ];

        let routes = vec![
            Route::post(
                "bid",
                config.bid_path(),
                Arc::new(BidReceiver::new(
                    exchange_for(&config.bid.exchange)?,
                    Arc::clone(&bid),
                    Arc::clone(&settings),
                    mapper,
                    codec.clone(),
                )),
            )
            .requires(Feature::Bid),
            Route::get(
                "impression",
                config.impression_path(),
                Arc::new(ImpressionReceiver::new(
                    exchange_for(&config.impression.exchange)?,
                    Arc::clone(&impression),
                    Arc::clone(&settings),
                    codec,
                )),
            )
            .requires(Feature::Impression),
            Route::get(
                "click",
                config.click_path(),
                Arc::new(ClickReceiver::new(
                    exchange_for(&config.click.exchange)?,
                    Arc::clone(&click),
                    Arc::clone(&settings),
                )),
            )
            .requires(Feature::Click),
            Route::get(
                "match",
                config.match_path(),
                Arc::new(MatchReceiver::new(
                    exchange_for(&config.matching.exchange)?,
                    Arc::clone(&matching),
                    Arc::clone(&settings),
                )),
            )
            .requires(Feature::Match),
            Route::get(
                "admin_health",
                &config.admin.health_path,
                Arc::new(HealthReceiver::new(infos.clone())),
            )
            .requires(Feature::Admin),
            Route::get(
                "admin_status",
                &config.admin.status_path,
                Arc::new(StatusReceiver::new(infos, config.admin.api_key.clone())),
            )
            .requires(Feature::Admin),
        ];

        let mut builder = Router::builder().routes(routes);
        for listener in &config.listeners {
            // validated above
            if let Ok(addr) = listener.bind_address.parse::<std::net::SocketAddr>() {
                builder = builder.listener(addr.port(), listener.features.iter().copied());
            }
        }
        let router = Arc::new(builder.build()?);

        Ok(Self {
            config,
            settings,
            router,
            bid,
            impression,
            click,
            matching,
        })
    }

    fn managed(&self) -> [&dyn Managed; 4] {
        [&self.bid, &self.impression, &self.click, &self.matching]
    }

    /// Start every controller and wait until all are running.
    ///
    /// Blocks while interceptor start hooks run. On failure, controllers
    /// that did start are stopped again.
    pub fn start(&self) -> Result<(), StartupError> {
        let result = self
            .managed()
            .iter()
            .try_for_each(|c| c.begin_start())
            .and_then(|()| self.managed().iter().try_for_each(|c| c.await_running()));

        match result {
            Ok(()) => {
                tracing::info!("All controllers running");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Controller startup failed");
                self.shutdown();
                Err(e.into())
            }
        }
    }

    /// Stop every controller and wait until all reach a final state.
    pub fn shutdown(&self) {
        for controller in self.managed() {
            controller.begin_stop();
        }
        for controller in self.managed() {
            let state = controller.await_terminated();
            tracing::info!(controller = controller.name(), %state, "Controller stopped");
        }
    }

    pub fn router(&self) -> Arc<Router> {
        Arc::clone(&self.router)
    }

    pub fn config(&self) -> &BidderConfig {
        &self.config
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn bid_controller(&self) -> &Arc<BidController> {
        &self.bid
    }

    pub fn impression_controller(&self) -> &Arc<ImpressionController> {
        &self.impression
    }

    pub fn click_controller(&self) -> &Arc<ClickController> {
        &self.click
    }

    pub fn match_controller(&self) -> &Arc<MatchController> {
        &self.matching
    }

    /// Apply the reloadable part of a new configuration.
    ///
    /// Listeners, routes and interceptors keep their startup values;
    /// changes to them are logged and need a restart.
    pub fn apply_settings(&self, config: &BidderConfig) {
        if config.listeners != self.config.listeners
            || config.bid != self.config.bid
            || config.impression != self.config.impression
            || config.click != self.config.click
            || config.matching != self.config.matching
        {
            tracing::warn!("Listener or endpoint changes require a restart; ignoring them");
        }
        self.settings.store(Arc::new(config.runtime_settings()));
        tracing::info!(
            price_parameter = %config.price.parameter,
            "Runtime settings reloaded"
        );
    }

    /// Apply every configuration received from a `ConfigWatcher`.
    pub fn watch_settings(
        self: &Arc<Self>,
        mut updates: mpsc::UnboundedReceiver<BidderConfig>,
    ) -> JoinHandle<()> {
        let app = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                app.apply_settings(&config);
            }
        })
    }
}

fn price_codec(config: &BidderConfig) -> Result<Option<PriceCodec>, KeyError> {
    match (&config.price.encryption_key, &config.price.integrity_key) {
        (Some(e), Some(i)) => Ok(Some(PriceCodec::from_base64(e, i)?)),
        _ => Ok(None),
    }
}
