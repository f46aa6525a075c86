//! Unsigned legacy transactions and their builder

use nodelink_primitives::{Address, ByteData, Quantity};

use crate::ClientError;

/// Unsigned legacy transaction
///
/// `to == None` creates a contract from `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    /// Sender nonce
    pub nonce: Quantity,
    /// Gas price in wei
    pub gas_price: Quantity,
    /// Gas limit
    pub gas_limit: Quantity,
    /// Recipient
    pub to: Option<Address>,
    /// Value in wei
    pub value: Quantity,
    /// Call data or init code
    pub data: ByteData,
}

impl RawTransaction {
    /// Plain value transfer
    pub fn transfer(
        nonce: impl Into<Quantity>,
        gas_price: impl Into<Quantity>,
        gas_limit: impl Into<Quantity>,
        to: Address,
        value: impl Into<Quantity>,
    ) -> Self {
        Self {
            nonce: nonce.into(),
            gas_price: gas_price.into(),
            gas_limit: gas_limit.into(),
            to: Some(to),
            value: value.into(),
            data: ByteData::new(),
        }
    }

    /// Contract deployment
    pub fn contract_creation(
        nonce: impl Into<Quantity>,
        gas_price: impl Into<Quantity>,
        gas_limit: impl Into<Quantity>,
        value: impl Into<Quantity>,
        init_code: impl Into<ByteData>,
    ) -> Self {
        Self {
            nonce: nonce.into(),
            gas_price: gas_price.into(),
            gas_limit: gas_limit.into(),
            to: None,
            value: value.into(),
            data: init_code.into(),
        }
    }

    /// Whether this deploys a contract
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// Transaction builder with fluent API
///
/// Fields left unset can be filled from the node by
/// [`TransactionManager::send`](crate::TransactionManager::send).
#[derive(Debug, Clone, Default)]
pub struct TxBuilder {
    nonce: Option<Quantity>,
    gas_price: Option<Quantity>,
    gas_limit: Option<Quantity>,
    to: Option<Address>,
    value: Quantity,
    data: ByteData,
}

impl TxBuilder {
    /// Create a new transaction builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nonce
    pub fn nonce(mut self, nonce: impl Into<Quantity>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Set the gas limit
    pub fn gas_limit(mut self, limit: impl Into<Quantity>) -> Self {
        self.gas_limit = Some(limit.into());
        self
    }

    /// Set the gas price
    pub fn gas_price(mut self, price: impl Into<Quantity>) -> Self {
        self.gas_price = Some(price.into());
        self
    }

    /// Set the recipient address
    pub fn to(mut self, address: Address) -> Self {
        self.to = Some(address);
        self
    }

    /// Set the value to transfer (in wei)
    pub fn value(mut self, value: impl Into<Quantity>) -> Self {
        self.value = value.into();
        self
    }

    /// Set the input data
    pub fn data(mut self, data: impl Into<ByteData>) -> Self {
        self.data = data.into();
        self
    }

    pub(crate) fn has_nonce(&self) -> bool {
        self.nonce.is_some()
    }

    pub(crate) fn has_gas_price(&self) -> bool {
        self.gas_price.is_some()
    }

    pub(crate) fn has_gas_limit(&self) -> bool {
        self.gas_limit.is_some()
    }

    pub(crate) fn recipient(&self) -> Option<Address> {
        self.to
    }

    pub(crate) fn call_value(&self) -> &Quantity {
        &self.value
    }

    pub(crate) fn call_data(&self) -> &ByteData {
        &self.data
    }

    /// Build the unsigned transaction
    pub fn build(&self) -> Result<RawTransaction, ClientError> {
        let nonce = self.nonce.clone().ok_or(ClientError::MissingField("nonce"))?;
        let gas_price = self
            .gas_price
            .clone()
            .ok_or(ClientError::MissingField("gas_price"))?;
        let gas_limit = self
            .gas_limit
            .clone()
            .ok_or(ClientError::MissingField("gas_limit"))?;

        Ok(RawTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: self.to,
            value: self.value.clone(),
            data: self.data.clone(),
        })
    }
}
