//! Process-wide SAML engine bootstrap.
//!
//! The engine owns the unmarshaller registry and the active
//! [`SamlConfig`]. It is created once per process behind a mutex;
//! a failed initialization stays failed until [`retry_saml_engine_init`]
//! is called.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::config::SamlConfig;
use crate::dom::{read_events, Document, Element, QName, StreamingDomBuilder};
use crate::error::{SamlError, SamlResult};
use crate::types::constants::{ASSERTION, SAML1_NS, SAML2_NS};
use crate::types::{saml1, saml2, AssertionModel, SamlAssertion, SamlVersion};

/// Unmarshaller registry and configuration.
#[derive(Debug)]
pub struct SamlEngine {
    unmarshallers: Vec<(&'static str, &'static str, SamlVersion)>,
    config: SamlConfig,
}

impl SamlEngine {
    /// Creates an engine after validating `config`.
    pub fn new(config: SamlConfig) -> SamlResult<Self> {
        config.validate()?;
        let unmarshallers = vec![
            (SAML1_NS, ASSERTION, SamlVersion::V1_1),
            (SAML2_NS, ASSERTION, SamlVersion::V2_0),
        ];
        Ok(Self {
            unmarshallers,
            config,
        })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &SamlConfig {
        &self.config
    }

    /// Classifies a root element by namespace and local name.
    pub fn version_of(&self, element: &Element) -> Option<SamlVersion> {
        self.version_of_name(element.name())
    }

    /// Classifies an element name.
    pub fn version_of_name(&self, name: &QName) -> Option<SamlVersion> {
        let namespace = name.namespace()?;
        self.unmarshallers
            .iter()
            .find(|(ns, local, _)| *ns == namespace && *local == name.local_name())
            .map(|(_, _, version)| *version)
    }

    /// Unmarshals an assertion element.
    pub fn unmarshal(&self, element: &Element) -> SamlResult<SamlAssertion> {
        let model = match self.version_of(element) {
            Some(SamlVersion::V1_1) => {
                AssertionModel::Saml1(Box::new(saml1::Assertion::unmarshal(element)?))
            }
            Some(SamlVersion::V2_0) => {
                AssertionModel::Saml2(Box::new(saml2::Assertion::unmarshal(element)?))
            }
            None => {
                let found = format!(
                    "{{{}}}{}",
                    element.namespace().unwrap_or_default(),
                    element.local_name()
                );
                debug!(%found, "unexpected root element for an assertion");
                return Err(SamlError::Unmarshal(format!("unexpected type {found}")));
            }
        };
        Ok(SamlAssertion::from_parsed(model, element.clone()))
    }

    /// Returns a streaming builder honouring the configured depth limit.
    pub fn dom_builder(&self) -> StreamingDomBuilder {
        StreamingDomBuilder::with_max_depth(self.config.max_element_depth)
    }

    /// Parses an XML string into a document.
    pub fn parse_document(&self, xml: &str) -> SamlResult<Document> {
        self.dom_builder().build_with(read_events(xml)?)
    }
}

#[derive(Debug)]
enum EngineState {
    Uninitialized,
    Ready(Arc<SamlEngine>),
    Failed(String),
}

/// Init-once holder for a [`SamlEngine`].
#[derive(Debug)]
pub struct EngineCell {
    state: Mutex<EngineState>,
}

impl Default for EngineCell {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineCell {
    /// Creates an uninitialized cell.
    pub const fn new() -> Self {
        Self {
            state: parking_lot::const_mutex(EngineState::Uninitialized),
        }
    }

    /// Returns the engine, initializing it with `config` on first use.
    ///
    /// Once initialized, `config` is ignored. After a failure the same
    /// error is returned without another attempt.
    pub fn get_or_init(&self, config: SamlConfig) -> SamlResult<Arc<SamlEngine>> {
        let mut state = self.state.lock();
        match &*state {
            EngineState::Ready(engine) => return Ok(Arc::clone(engine)),
            EngineState::Failed(reason) => return Err(SamlError::EngineInit(reason.clone())),
            EngineState::Uninitialized => {}
        }
        Self::initialize(&mut state, config)
    }

    /// Clears a previous failure and initializes again.
    ///
    /// Returns the existing engine if initialization already succeeded.
    pub fn retry(&self, config: SamlConfig) -> SamlResult<Arc<SamlEngine>> {
        let mut state = self.state.lock();
        if let EngineState::Ready(engine) = &*state {
            return Ok(Arc::clone(engine));
        }
        Self::initialize(&mut state, config)
    }

    /// Returns the engine if it is ready.
    pub fn get(&self) -> Option<Arc<SamlEngine>> {
        match &*self.state.lock() {
            EngineState::Ready(engine) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    fn initialize(state: &mut EngineState, config: SamlConfig) -> SamlResult<Arc<SamlEngine>> {
        match SamlEngine::new(config) {
            Ok(engine) => {
                let engine = Arc::new(engine);
                debug!("SAML engine initialized");
                *state = EngineState::Ready(Arc::clone(&engine));
                Ok(engine)
            }
            Err(err) => {
                let reason = err.to_string();
                error!(%reason, "SAML engine initialization failed");
                *state = EngineState::Failed(reason.clone());
                Err(SamlError::EngineInit(reason))
            }
        }
    }
}

static SAML_ENGINE: EngineCell = EngineCell::new();

/// Initializes the process-wide engine. Idempotent after success.
pub fn init_saml_engine(config: SamlConfig) -> SamlResult<Arc<SamlEngine>> {
    SAML_ENGINE.get_or_init(config)
}

/// Retries a failed process-wide initialization.
pub fn retry_saml_engine_init(config: SamlConfig) -> SamlResult<Arc<SamlEngine>> {
    SAML_ENGINE.retry(config)
}

/// Returns the process-wide engine, initializing it with defaults if needed.
pub fn saml_engine() -> SamlResult<Arc<SamlEngine>> {
    SAML_ENGINE.get_or_init(SamlConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid() -> SamlConfig {
        SamlConfig {
            max_element_depth: 0,
            ..SamlConfig::default()
        }
    }

    #[test]
    fn initializes_once() {
        let cell = EngineCell::new();
        assert!(cell.get().is_none());

        let first = cell.get_or_init(SamlConfig::default()).unwrap();
        let second = cell
            .get_or_init(SamlConfig {
                allow_sha1: true,
                ..SamlConfig::default()
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!second.config().allow_sha1);
    }

    #[test]
    fn failure_is_sticky_until_retry() {
        let cell = EngineCell::new();
        assert!(matches!(cell.get_or_init(invalid()), Err(SamlError::EngineInit(_))));
        assert!(matches!(
            cell.get_or_init(SamlConfig::default()),
            Err(SamlError::EngineInit(_))
        ));

        let engine = cell.retry(SamlConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&engine, &cell.get().unwrap()));
    }

    #[test]
    fn retry_after_success_is_a_no_op() {
        let cell = EngineCell::new();
        let engine = cell.get_or_init(SamlConfig::default()).unwrap();
        assert!(Arc::ptr_eq(&engine, &cell.retry(invalid()).unwrap()));
    }

    #[test]
    fn classifies_roots() {
        let engine = SamlEngine::new(SamlConfig::default()).unwrap();
        assert_eq!(
            engine.version_of(&Element::new_ns(SAML1_NS, "saml", ASSERTION)),
            Some(SamlVersion::V1_1)
        );
        assert_eq!(
            engine.version_of(&Element::new_ns(SAML2_NS, "saml2", ASSERTION)),
            Some(SamlVersion::V2_0)
        );
        assert_eq!(engine.version_of(&Element::new_ns(SAML2_NS, "saml2", "Issuer")), None);
    }

    #[test]
    fn unknown_root_is_unmarshal_error() {
        let engine = SamlEngine::new(SamlConfig::default()).unwrap();
        let element = Element::new_ns("urn:oasis:names:tc:SAML:2.0:protocol", "samlp", "Response");
        let err = engine.unmarshal(&element).unwrap_err();
        assert!(matches!(err, SamlError::Unmarshal(_)));
        assert!(err.to_string().contains("Response"));
    }

    #[test]
    fn document_parsing_honours_depth_limit() {
        let engine = SamlEngine::new(SamlConfig {
            max_element_depth: 2,
            ..SamlConfig::default()
        })
        .unwrap();
        assert!(engine.parse_document("<a><b/></a>").is_ok());
        assert!(matches!(
            engine.parse_document("<a><b><c/></b></a>"),
            Err(SamlError::Parse(_))
        ));
    }
}
