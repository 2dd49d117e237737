//! Topology construction: roles, addressing, commands and dependencies.

use std::collections::BTreeMap;

use rand::distributions::{Alphanumeric, DistString};
use tracing::debug;

use crate::config::{AuthMode, ClusterConfig, ClusterDefaults};
use crate::handle::ClusterHandle;
use crate::node::{ENV_NO_AUTH, ENV_ROOT_PASSWORD, Node};
use crate::role::{CommandContext, Role, RoleCatalog};
use crate::Result;

/// Length of generated root passwords.
const RANDOM_PASSWORD_LEN: usize = 16;

/// Builds a [`ClusterHandle`] from a validated [`ClusterConfig`].
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    catalog: RoleCatalog,
    defaults: ClusterDefaults,
}

impl TopologyBuilder {
    /// Creates a builder using the binary, port, host and user from `defaults`.
    pub fn new(defaults: &ClusterDefaults) -> Self {
        Self {
            catalog: RoleCatalog::new(defaults.binary.clone(), defaults.server_port),
            defaults: defaults.clone(),
        }
    }

    pub fn catalog(&self) -> &RoleCatalog {
        &self.catalog
    }

    /// Builds the full topology.
    ///
    /// Every precondition is checked before the first node is created, so a
    /// failed build never yields a partial topology.
    pub fn build(&self, config: &ClusterConfig) -> Result<ClusterHandle> {
        config.validate()?;
        let auth = config.auth_mode()?;

        let password = match &auth {
            AuthMode::NoAuth => None,
            AuthMode::Password(password) => Some(password.clone()),
            AuthMode::RandomPassword => Some(generate_password()),
        };

        let port = self.catalog.port();
        let mut agents = Vec::with_capacity(config.agent_count);

        // The leader endpoint is fixed before any follower is built.
        let leader_alias = self.catalog.alias_for(Role::AgentLeader, 1);
        let leader_endpoint = self.catalog.endpoint_for(&leader_alias, port);
        agents.push(self.node(
            config,
            Role::AgentLeader,
            leader_alias.clone(),
            leader_endpoint.clone(),
            &[],
            Vec::new(),
            exposed(config.expose_agents, config.agent_port_from, 0),
            None,
        ));

        let leader_endpoints = vec![leader_endpoint];
        for i in 2..=config.agent_count {
            let alias = self.catalog.alias_for(Role::Agent, i);
            let endpoint = self.catalog.endpoint_for(&alias, port);
            agents.push(self.node(
                config,
                Role::Agent,
                alias,
                endpoint,
                &leader_endpoints,
                vec![leader_alias.clone()],
                exposed(config.expose_agents, config.agent_port_from, i - 1),
                None,
            ));
        }

        let agent_endpoints: Vec<String> = agents.iter().map(|a| a.endpoint.clone()).collect();
        let agent_aliases: Vec<String> = agents.iter().map(|a| a.alias.clone()).collect();

        let databases = (1..=config.data_server_count)
            .map(|i| {
                let alias = self.catalog.alias_for(Role::DataServer, i);
                let endpoint = self.catalog.endpoint_for(&alias, port);
                self.node(
                    config,
                    Role::DataServer,
                    alias,
                    endpoint,
                    &agent_endpoints,
                    agent_aliases.clone(),
                    exposed(config.expose_data_servers, config.data_server_port_from, i - 1),
                    None,
                )
            })
            .collect::<Vec<_>>();

        // Coordinators are the client-facing entry points and always published.
        let coordinators = (1..=config.coordinator_count)
            .map(|i| {
                let alias = self.catalog.alias_for(Role::Coordinator, i);
                let endpoint = self.catalog.endpoint_for(&alias, port);
                self.node(
                    config,
                    Role::Coordinator,
                    alias,
                    endpoint,
                    &agent_endpoints,
                    agent_aliases.clone(),
                    exposed(true, config.coordinator_port_from, i - 1),
                    password.as_deref(),
                )
            })
            .collect::<Vec<_>>();

        debug!(
            agents = agents.len(),
            data_servers = databases.len(),
            coordinators = coordinators.len(),
            image = %config.image,
            "built cluster topology"
        );

        Ok(ClusterHandle::new(
            agents,
            databases,
            coordinators,
            auth,
            password,
            self.defaults.user.clone(),
            self.defaults.host.clone(),
            config.image.clone(),
        ))
    }

    /// Creates one node. `password` enables authentication for the node.
    fn node(
        &self,
        config: &ClusterConfig,
        role: Role,
        alias: String,
        endpoint: String,
        agency_endpoints: &[String],
        depends_on: Vec<String>,
        exposed_port: Option<u16>,
        password: Option<&str>,
    ) -> Node {
        let command = self.catalog.command_for(&CommandContext {
            role,
            alias: &alias,
            endpoint: &endpoint,
            agent_count: config.agent_count,
            agency_endpoints,
            authentication: password.is_some(),
            extra_args: &config.extra_args,
        });

        let env = match password {
            Some(password) => BTreeMap::from([(ENV_ROOT_PASSWORD.to_string(), password.to_string())]),
            None => BTreeMap::from([(ENV_NO_AUTH.to_string(), "1".to_string())]),
        };

        Node {
            alias,
            role,
            endpoint,
            command,
            depends_on,
            image: config.image.clone(),
            env,
            server_port: self.catalog.port(),
            exposed_port,
        }
    }
}

fn exposed(expose: bool, from: u16, offset: usize) -> Option<u16> {
    // Range overflow is rejected by ClusterConfig::validate.
    expose.then(|| from + offset as u16)
}

fn generate_password() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), RANDOM_PASSWORD_LEN)
}
