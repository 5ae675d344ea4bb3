/// Module for computing the live subset of an artifact's methods.
///
/// Obfuscated builds carry large amounts of dead and decoy code. Matching only makes sense over
/// methods the program can actually run, so the scanner seeds a work queue with methods the
/// runtime calls by contract (listener callbacks, `run`, `compare`, constructors, ...) in
/// anchor-like classes and expands breadth-first through call sites. Abstract call targets are
/// resolved to a concrete override in a subclass or implementor.
///
/// # Usage
/// ```rust,ignore
/// let live = ReachabilityScanner::new(&artifact, &ReachabilityConfig::default()).scan();
/// ```
use remora_core::{Artifact, ClassDef, Insn, MethodDef, MethodKey, Opcode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::debug;

/// Method names of the platform types whose overrides the runtime invokes directly.
pub const OVERRIDE_CONTRACTS: &[(&str, &[&str])] = &[
    (
        "java/applet/Applet",
        &[
            "init",
            "start",
            "stop",
            "destroy",
            "getAppletInfo",
            "getParameter",
            "getParameterInfo",
            "getAppletContext",
            "getCodeBase",
            "getDocumentBase",
            "isActive",
            "resize",
            "showStatus",
            "paint",
            "update",
        ],
    ),
    ("java/lang/Runnable", &["run"]),
    ("java/awt/event/FocusListener", &["focusGained", "focusLost"]),
    (
        "java/awt/event/WindowListener",
        &[
            "windowOpened",
            "windowClosing",
            "windowClosed",
            "windowIconified",
            "windowDeiconified",
            "windowActivated",
            "windowDeactivated",
        ],
    ),
    (
        "java/awt/event/MouseListener",
        &[
            "mouseClicked",
            "mousePressed",
            "mouseReleased",
            "mouseEntered",
            "mouseExited",
        ],
    ),
    ("java/awt/event/MouseMotionListener", &["mouseDragged", "mouseMoved"]),
    ("java/awt/event/MouseWheelListener", &["mouseWheelMoved"]),
    ("java/awt/event/MouseAdapter", &["mouseWheelMoved", "mouseDragged", "mouseMoved"]),
    ("java/awt/event/KeyListener", &["keyTyped", "keyPressed", "keyReleased"]),
    ("java/util/Comparator", &["compare", "equals", "reversed"]),
    ("java/lang/Comparable", &["compareTo"]),
    ("java/util/concurrent/Callable", &["call"]),
    ("java/util/concurrent/ThreadFactory", &["newThread"]),
    ("java/lang/Iterable", &["iterator", "forEach", "spliterator"]),
    ("java/util/Iterator", &["hasNext", "next", "remove", "forEachRemaining"]),
    (
        "java/util/Collection",
        &[
            "size",
            "isEmpty",
            "contains",
            "toArray",
            "add",
            "remove",
            "containsAll",
            "addAll",
            "removeAll",
            "removeIf",
            "retainAll",
            "clear",
            "equals",
            "hashCode",
            "stream",
            "parallelStream",
        ],
    ),
    ("java/util/AbstractQueue", &["add", "remove", "element", "clear", "addAll", "offer", "poll", "peek"]),
    ("java/awt/Canvas", &["paint", "update", "addNotify", "createBufferStrategy", "getBufferStrategy"]),
    (
        "javax/net/ssl/SSLSession",
        &[
            "getId",
            "getSessionContext",
            "getCreationTime",
            "getLastAccessedTime",
            "invalidate",
            "isValid",
            "putValue",
            "getValue",
            "removeValue",
            "getValueNames",
            "getPeerCertificates",
            "getLocalCertificates",
            "getPeerCertificateChain",
            "getPeerPrincipal",
            "getLocalPrincipal",
            "getCipherSuite",
            "getProtocol",
            "getPeerHost",
            "getPeerPort",
            "getPacketBufferSize",
            "getApplicationBufferSize",
        ],
    ),
    (
        "javax/net/ssl/SSLSocket",
        &[
            "getSupportedCipherSuites",
            "getEnabledCipherSuites",
            "setEnabledCipherSuites",
            "getSupportedProtocols",
            "getEnabledProtocols",
            "setEnabledProtocols",
            "getSession",
            "addHandshakeCompletedListener",
            "removeHandshakeCompletedListener",
            "startHandshake",
            "setUseClientMode",
            "getUseClientMode",
            "setNeedClientAuth",
            "getNeedClientAuth",
            "setWantClientAuth",
            "getWantClientAuth",
            "setEnableSessionCreation",
            "getEnableSessionCreation",
            "getInputStream",
            "getOutputStream",
            "close",
        ],
    ),
    (
        "javax/net/ssl/SSLSocketFactory",
        &["createSocket", "getDefaultCipherSuites", "getSupportedCipherSuites"],
    ),
    (
        "org/bouncycastle/crypto/tls/DefaultTlsClient",
        &["getCipherSuites", "getAuthentication", "getClientExtensions"],
    ),
    (
        "org/bouncycastle/crypto/tls/TlsClient",
        &[
            "init",
            "getSessionToResume",
            "getClientVersion",
            "getCipherSuites",
            "getCompressionMethods",
            "getClientExtensions",
            "notifyServerVersion",
            "notifySessionID",
            "notifySelectedCipherSuite",
            "notifySelectedCompressionMethod",
            "processServerExtensions",
            "getAuthentication",
            "notifyHandshakeComplete",
        ],
    ),
    (
        "org/bouncycastle/crypto/tls/TlsAuthentication",
        &["notifyServerCertificate", "getClientCredentials"],
    ),
    (
        "java/lang/RuntimeException",
        &["getMessage", "getLocalizedMessage", "getCause", "toString", "fillInStackTrace"],
    ),
    ("java/lang/annotation/Annotation", &["annotationType", "equals", "hashCode", "toString"]),
];

/// Settings for the reachability scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    /// Owner names up to this length count as obfuscated
    pub max_obfuscated_name_len: usize,
    /// Classes that anchor the scan regardless of their name length
    pub root_classes: Vec<String>,
    /// Extra method names treated as override contracts
    pub extra_contract_methods: Vec<String>,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            max_obfuscated_name_len: 2,
            root_classes: vec!["client".to_string()],
            extra_contract_methods: Vec::new(),
        }
    }
}

/// `true` for the stack-introspection guard shape: returns a `String` and inspects a stack
/// trace through a virtual call.
pub fn is_stack_introspection_guard(method: &MethodDef) -> bool {
    method.desc.ends_with("Ljava/lang/String;")
        && method.instructions.iter().any(|insn| {
            matches!(
                insn,
                Insn::Invoke { opcode: Opcode::INVOKEVIRTUAL, desc, .. }
                    if desc.contains("[Ljava/lang/StackTraceElement;")
            )
        })
}

/// Breadth-first reachability over one artifact.
#[derive(Debug)]
pub struct ReachabilityScanner<'a> {
    artifact: &'a Artifact,
    config: &'a ReachabilityConfig,
    contracts: HashSet<&'a str>,
    /// direct subclasses and implementors, in artifact order
    subtypes: HashMap<&'a str, Vec<&'a ClassDef>>,
}

impl<'a> ReachabilityScanner<'a> {
    pub fn new(artifact: &'a Artifact, config: &'a ReachabilityConfig) -> Self {
        let contracts = OVERRIDE_CONTRACTS
            .iter()
            .flat_map(|(_, names)| names.iter().copied())
            .chain(config.extra_contract_methods.iter().map(String::as_str))
            .collect();
        let mut subtypes: HashMap<&str, Vec<&ClassDef>> = HashMap::new();
        for class in &artifact.classes {
            for parent in class.super_name.iter().chain(class.interfaces.iter()) {
                subtypes.entry(parent.as_str()).or_default().push(class);
            }
        }
        Self {
            artifact,
            config,
            contracts,
            subtypes,
        }
    }

    /// Short obfuscated-looking names and configured root classes.
    pub fn is_anchor_like(&self, owner: &str) -> bool {
        owner.len() <= self.config.max_obfuscated_name_len
            || self.config.root_classes.iter().any(|r| r == owner)
    }

    /// Whether a method of an anchor-like class starts the scan.
    pub fn is_seed(&self, method: &MethodDef) -> bool {
        !method.is_abstract
            && (method.name.starts_with('<')
                || self.contracts.contains(method.name.as_str())
                || is_stack_introspection_guard(method))
    }

    /// Computes the set of reachable methods.
    pub fn scan(&self) -> BTreeSet<MethodKey> {
        let mut queue: VecDeque<MethodKey> = self
            .artifact
            .classes
            .iter()
            .filter(|c| self.is_anchor_like(&c.name))
            .flat_map(|c| {
                c.methods
                    .iter()
                    .filter(move |m| self.is_seed(m))
                    .map(move |m| m.key(&c.name))
            })
            .collect();
        let seeds = queue.len();

        let mut used = BTreeSet::new();
        let mut dropped = 0usize;
        while let Some(key) = queue.pop_front() {
            let Some(method) = self.artifact.method(&key) else {
                continue;
            };
            if !used.insert(key) {
                continue;
            }
            for callee in method.call_sites() {
                if !self.is_anchor_like(&callee.owner) {
                    continue;
                }
                let Some(target) = self.artifact.method(&callee) else {
                    continue;
                };
                if !target.is_abstract {
                    if !used.contains(&callee) {
                        queue.push_back(callee);
                    }
                    continue;
                }
                match self.resolve_override(&callee) {
                    Some(concrete) if !used.contains(&concrete) => queue.push_back(concrete),
                    Some(_) => {}
                    None => dropped += 1,
                }
            }
        }

        debug!(
            "reachability: {} seeds, {} live methods, {} unresolved abstract edges",
            seeds,
            used.len(),
            dropped
        );
        used
    }

    /// Finds the first concrete override of an abstract method among transitive subtypes.
    pub fn resolve_override(&self, key: &MethodKey) -> Option<MethodKey> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([key.owner.as_str()]);
        while let Some(owner) = queue.pop_front() {
            for sub in self.subtypes.get(owner).into_iter().flatten() {
                if !seen.insert(sub.name.as_str()) || sub.name == key.owner {
                    continue;
                }
                if let Some(m) = sub.method(&key.name, &key.desc) {
                    if !m.is_abstract {
                        return Some(m.key(&sub.name));
                    }
                }
                queue.push_back(&sub.name);
            }
        }
        None
    }
}
