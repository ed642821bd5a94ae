//! Remote registry adapter
//!
//! Rebuilds registry-wide operations (pattern queries, domain enumeration,
//! query filtering) on top of the five request types an agent understands.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rmx_protocol::{
    Attribute, AttributeList, ExecRequest, InstanceDescriptor, ListRequest, MBeanInfo,
    ObjectInstance, ObjectName, ProcessingOptions, ProtocolError, ReadRequest, ReadValue, Request,
    Response, SearchRequest, WriteRequest,
};
use serde_json::Value;

use crate::config::ClientConfig;
use crate::connection::{NotificationListener, RegistryConnection};
use crate::error::{ClientError, ClientResult, TransportError};
use crate::query::{evaluate, QueryExp, RegistryBinding};
use crate::transport::{HttpTransport, Transport};

/// Registry connection backed by a remote agent
///
/// Holds no state besides its collaborators; share it across tasks behind an
/// `Arc`.
pub struct RemoteRegistryAdapter {
    transport: Arc<dyn Transport>,
    binding: RegistryBinding,
    read_defaults: ProcessingOptions,
}

impl RemoteRegistryAdapter {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            binding: RegistryBinding::Unbound,
            read_defaults: ProcessingOptions::default(),
        }
    }

    /// Adapter over an [`HttpTransport`] built from `config`
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = HttpTransport::from_config(&config.transport)?;
        Ok(Self::new(Arc::new(transport)).with_read_defaults(config.read.clone()))
    }

    pub fn with_binding(mut self, binding: RegistryBinding) -> Self {
        self.binding = binding;
        self
    }

    /// Options filled into every read that leaves them unset
    pub fn with_read_defaults(mut self, options: ProcessingOptions) -> Self {
        self.read_defaults = options;
        self
    }

    pub fn binding(&self) -> &RegistryBinding {
        &self.binding
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn send(&self, request: Request) -> ClientResult<Response> {
        tracing::debug!(
            request_type = %request.request_type(),
            name = %request.name().map(ObjectName::canonical_string).unwrap_or_default(),
            transport = self.transport.name(),
            "Sending request"
        );

        let envelope = self
            .transport
            .execute(&request)
            .await
            .map_err(|e| self.transport_failure(e))?;

        Ok(Response::decode(&request, &envelope)?)
    }

    async fn send_batch(&self, requests: &[Request]) -> ClientResult<Vec<Response>> {
        tracing::debug!(
            count = requests.len(),
            transport = self.transport.name(),
            "Sending batch"
        );

        let envelopes = self
            .transport
            .execute_batch(requests)
            .await
            .map_err(|e| self.transport_failure(e))?;

        Ok(Response::decode_batch(requests, &envelopes)?)
    }

    fn transport_failure(&self, err: TransportError) -> ClientError {
        tracing::warn!(
            transport = self.transport.name(),
            error = %err,
            "Transport failure"
        );
        ClientError::from_transport(err)
    }

    async fn read(&self, request: ReadRequest) -> ClientResult<ReadValue> {
        let options = request.options().or(&self.read_defaults);
        let request = request.with_options(options);
        Ok(self.send(request.into()).await?.into_read()?.value)
    }

    /// Names matching `pattern`, in the order the agent reported them
    async fn search(&self, pattern: Option<&ObjectName>) -> ClientResult<Vec<ObjectName>> {
        let pattern = pattern.cloned().unwrap_or_else(ObjectName::wildcard);
        Ok(self
            .send(SearchRequest::new(pattern).into())
            .await?
            .into_search()?
            .names)
    }

    async fn list(&self, name: Option<&ObjectName>) -> ClientResult<Vec<InstanceDescriptor>> {
        Ok(self
            .send(ListRequest::new(name.cloned()).into())
            .await?
            .into_list()?
            .instances)
    }

    async fn accepts(&self, query: Option<&dyn QueryExp>, name: &ObjectName) -> ClientResult<bool> {
        match query {
            Some(query) => evaluate(self, query, name).await,
            None => Ok(true),
        }
    }
}

fn single_value(value: ReadValue, name: &ObjectName) -> ClientResult<Value> {
    match value {
        ReadValue::Single(value) => Ok(value),
        other => Err(ProtocolError::InvalidState {
            reason: format!("expected a single value for {}, got {:?}", name, other),
        }
        .into()),
    }
}

#[async_trait]
impl RegistryConnection for RemoteRegistryAdapter {
    async fn get_object_instance(&self, name: &ObjectName) -> ClientResult<ObjectInstance> {
        self.list(Some(name))
            .await?
            .first()
            .map(|descriptor| ObjectInstance::new(name.clone(), descriptor.class_name.clone()))
            .ok_or_else(|| {
                ProtocolError::InstanceNotFound {
                    name: name.canonical_string(),
                }
                .into()
            })
    }

    async fn query_mbeans(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> ClientResult<HashSet<ObjectInstance>> {
        let mut seen = HashSet::new();
        let mut instances = HashSet::new();
        for descriptor in self.list(pattern).await? {
            if !seen.insert(descriptor.name.clone()) {
                continue;
            }
            if self.accepts(query, &descriptor.name).await? {
                instances.insert(descriptor.to_instance());
            }
        }
        Ok(instances)
    }

    async fn query_names(
        &self,
        pattern: Option<&ObjectName>,
        query: Option<&dyn QueryExp>,
    ) -> ClientResult<HashSet<ObjectName>> {
        let mut names = HashSet::new();
        for name in self.search(pattern).await? {
            if self.accepts(query, &name).await? {
                names.insert(name);
            }
        }
        Ok(names)
    }

    async fn is_registered(&self, name: &ObjectName) -> ClientResult<bool> {
        Ok(!self.search(Some(name)).await?.is_empty())
    }

    async fn get_mbean_count(&self) -> ClientResult<usize> {
        Ok(self.query_names(None, None).await?.len())
    }

    async fn get_attribute(&self, name: &ObjectName, attribute: &str) -> ClientResult<Value> {
        let value = self.read(ReadRequest::new(name.clone(), attribute)).await?;
        single_value(value, name)
    }

    async fn get_attributes(
        &self,
        name: &ObjectName,
        attributes: &[&str],
    ) -> ClientResult<AttributeList> {
        if attributes.is_empty() {
            return Ok(AttributeList::new());
        }
        match self.read(ReadRequest::new(name.clone(), attributes)).await? {
            ReadValue::Attributes(list) => Ok(list),
            other => Err(ProtocolError::InvalidState {
                reason: format!("expected attribute values for {}, got {:?}", name, other),
            }
            .into()),
        }
    }

    async fn set_attribute(&self, name: &ObjectName, attribute: Attribute) -> ClientResult<()> {
        let request = WriteRequest::new(name.clone(), attribute.name, attribute.value);
        self.send(request.into()).await?.into_write()?;
        Ok(())
    }

    async fn set_attributes(
        &self,
        name: &ObjectName,
        attributes: AttributeList,
    ) -> ClientResult<AttributeList> {
        if attributes.is_empty() {
            return Ok(attributes);
        }

        let requests: Vec<Request> = attributes
            .iter()
            .map(|a| WriteRequest::new(name.clone(), a.name.clone(), a.value.clone()).into())
            .collect();
        for response in self.send_batch(&requests).await? {
            response.into_write()?;
        }
        Ok(attributes)
    }

    async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
        params: &[Value],
        _signature: &[&str],
    ) -> ClientResult<Value> {
        let request = ExecRequest::new(name.clone(), operation, params.to_vec());
        Ok(self.send(request.into()).await?.into_exec()?.value)
    }

    async fn get_default_domain(&self) -> ClientResult<String> {
        self.get_domains()
            .await?
            .into_iter()
            .next()
            .ok_or(ClientError::RegistryEmpty)
    }

    async fn get_domains(&self) -> ClientResult<Vec<String>> {
        let mut domains: Vec<String> = Vec::new();
        for name in self.search(None).await? {
            if !domains.iter().any(|d| d == name.domain()) {
                domains.push(name.domain().to_string());
            }
        }
        Ok(domains)
    }

    async fn get_mbean_info(&self, name: &ObjectName) -> ClientResult<MBeanInfo> {
        let descriptor = self
            .list(Some(name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::InstanceNotFound {
                name: name.canonical_string(),
            })?;

        Ok(descriptor.info.unwrap_or_else(|| MBeanInfo {
            class_name: descriptor.class_name,
            ..MBeanInfo::default()
        }))
    }

    async fn is_instance_of(&self, name: &ObjectName, class_name: &str) -> ClientResult<bool> {
        // Only the declared class is known remotely
        Ok(self.get_object_instance(name).await?.class_name == class_name)
    }

    async fn create_mbean(
        &self,
        _class_name: &str,
        _name: Option<&ObjectName>,
    ) -> ClientResult<ObjectInstance> {
        Err(ClientError::unsupported("create_mbean"))
    }

    async fn unregister_mbean(&self, _name: &ObjectName) -> ClientResult<()> {
        Err(ClientError::unsupported("unregister_mbean"))
    }

    async fn add_notification_listener(
        &self,
        _name: &ObjectName,
        _listener: Arc<dyn NotificationListener>,
    ) -> ClientResult<()> {
        Err(ClientError::unsupported("add_notification_listener"))
    }

    async fn remove_notification_listener(
        &self,
        _name: &ObjectName,
        _listener: Arc<dyn NotificationListener>,
    ) -> ClientResult<()> {
        Err(ClientError::unsupported("remove_notification_listener"))
    }
}
