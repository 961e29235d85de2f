//! Principal and permission policy.
//!
//! Host identities expand into extra principals (suffix-stripped short name,
//! configured aliases). User identities never expand. Extensions are granted
//! to user certificates only.

use std::collections::{BTreeMap, HashMap};

use ks_types::CertClass;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrincipalPolicy {
    strip_suffix: Option<String>,
    aliases: HashMap<String, Vec<String>>,
    user_extensions: Vec<String>,
}

impl PrincipalPolicy {
    pub fn new(
        strip_suffix: Option<String>,
        aliases: HashMap<String, Vec<String>>,
        user_extensions: Vec<String>,
    ) -> Self {
        Self {
            strip_suffix: strip_suffix.filter(|s| !s.is_empty()),
            aliases,
            user_extensions,
        }
    }

    /// Principals for a certificate, canonical identity first.
    ///
    /// For hosts the order is: identity, identity without the configured
    /// suffix, then aliases in configured order. Duplicates keep their first
    /// position.
    pub fn derive_principals(&self, class: CertClass, identity: &str) -> Vec<String> {
        let mut principals = vec![identity.to_string()];
        if class == CertClass::User {
            return principals;
        }

        if let Some(suffix) = &self.strip_suffix
            && let Some(short) = identity.strip_suffix(suffix.as_str())
            && !short.is_empty()
        {
            push_unique(&mut principals, short);
        }

        if let Some(aliases) = self.aliases.get(identity) {
            for alias in aliases {
                push_unique(&mut principals, alias);
            }
        }

        principals
    }

    /// Extensions for a certificate: each configured name with an empty value,
    /// for user certificates only.
    pub fn derive_extensions(&self, class: CertClass) -> BTreeMap<String, String> {
        match class {
            CertClass::User => self
                .user_extensions
                .iter()
                .map(|name| (name.clone(), String::new()))
                .collect(),
            CertClass::Host => BTreeMap::new(),
        }
    }
}

fn push_unique(principals: &mut Vec<String>, candidate: &str) {
    if !principals.iter().any(|p| p == candidate) {
        principals.push(candidate.to_string());
    }
}
