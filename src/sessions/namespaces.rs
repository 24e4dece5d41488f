// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Namespace negotiation for session proposals.

use std::collections::BTreeMap;

use super::types::{
    ProposalNamespace, SessionNamespace, SessionProposal, STELLAR_NAMESPACE, SUPPORTED_CHAINS,
    SUPPORTED_EVENTS, SUPPORTED_METHODS,
};
use super::{BrokerError, BrokerResult};

/// Namespaces to grant for `proposal`.
///
/// Only `active_chain` is granted, with one `"{chain}:{publicKey}"` account
/// per entry of `public_keys`. Methods and events are the intersection of
/// what was requested and what the wallet supports; a required method or
/// chain the wallet cannot serve fails the negotiation.
pub fn negotiate(
    proposal: &SessionProposal,
    public_keys: &[String],
    active_chain: &str,
) -> BrokerResult<BTreeMap<String, SessionNamespace>> {
    if let Some(key) = proposal
        .required_namespaces
        .keys()
        .find(|key| namespace_of(key) != STELLAR_NAMESPACE)
    {
        return Err(BrokerError::UnsupportedChain(key.clone()));
    }

    let requested: Vec<&ProposalNamespace> = stellar_entries(&proposal.required_namespaces)
        .chain(stellar_entries(&proposal.optional_namespaces))
        .collect();

    let required_chains = stellar_entries(&proposal.required_namespaces).flat_map(|ns| ns.chains.iter());
    for chain in required_chains {
        if !SUPPORTED_CHAINS.contains(&chain.as_str()) {
            return Err(BrokerError::UnsupportedChain(chain.clone()));
        }
    }

    let chains: Vec<&str> = requested
        .iter()
        .flat_map(|ns| ns.chains.iter().map(String::as_str))
        .filter(|c| SUPPORTED_CHAINS.contains(c))
        .collect();
    if chains.is_empty() {
        return Err(BrokerError::UnsupportedChain(
            "no supported Stellar chain requested".to_string(),
        ));
    }
    if !chains.contains(&active_chain) {
        return Err(BrokerError::WrongNetworkForProposal {
            requested: chains.iter().map(|c| c.to_string()).collect(),
            active: active_chain.to_string(),
        });
    }

    for method in stellar_entries(&proposal.required_namespaces).flat_map(|ns| ns.methods.iter()) {
        if !SUPPORTED_METHODS.contains(&method.as_str()) {
            return Err(BrokerError::UnsupportedMethod(method.clone()));
        }
    }

    let methods = intersect(requested.iter().flat_map(|ns| ns.methods.iter()), &SUPPORTED_METHODS);
    let events = intersect(requested.iter().flat_map(|ns| ns.events.iter()), &SUPPORTED_EVENTS);

    let namespace = SessionNamespace {
        accounts: public_keys
            .iter()
            .map(|pk| format!("{active_chain}:{pk}"))
            .collect(),
        chains: vec![active_chain.to_string()],
        methods,
        events,
    };
    Ok(BTreeMap::from([(STELLAR_NAMESPACE.to_string(), namespace)]))
}

/// `"stellar"` for both `"stellar"` and `"stellar:pubnet"` keys.
fn namespace_of(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

fn stellar_entries(
    namespaces: &BTreeMap<String, ProposalNamespace>,
) -> impl Iterator<Item = &ProposalNamespace> {
    namespaces
        .iter()
        .filter(|(key, _)| namespace_of(key) == STELLAR_NAMESPACE)
        .map(|(_, ns)| ns)
}

fn intersect<'a>(requested: impl Iterator<Item = &'a String>, supported: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in requested {
        if supported.contains(&item.as_str()) && !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}
