pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;

pub type DeploymentImpl = local_deployment::LocalDeployment;

#[cfg(test)]
pub(crate) mod test_support;
