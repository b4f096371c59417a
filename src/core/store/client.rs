use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::Deserialize;
use serde_json::Value;

use super::types::{ClientRecord, ClientStatus, ClientType, TechnicalRecord};
use super::{parse_ts, ts, Store};

/// Partial update; the generated business id and the technical record are
/// managed by the service, not by callers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub client_type: Option<ClientType>,
    pub status: Option<ClientStatus>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<Value>,
    pub contact: Option<Value>,
    pub contract_info: Option<Value>,
}

const CLIENT_COLUMNS: &str = "id, name, client_id, type, status, email, phone, address, contact, \
     equipment, technical_record, contract_info, created_at, updated_at";

struct ClientRow {
    id: String,
    name: String,
    client_id: String,
    client_type: String,
    status: String,
    email: String,
    phone: String,
    address: Option<String>,
    contact: Option<String>,
    equipment: String,
    technical_record: String,
    contract_info: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<ClientRow> {
    Ok(ClientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        client_id: row.get(2)?,
        client_type: row.get(3)?,
        status: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        address: row.get(7)?,
        contact: row.get(8)?,
        equipment: row.get(9)?,
        technical_record: row.get(10)?,
        contract_info: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn hydrate(raw: ClientRow) -> Result<ClientRecord> {
    Ok(ClientRecord {
        client_type: ClientType::parse(&raw.client_type)
            .ok_or_else(|| anyhow!("unknown client type {:?}", raw.client_type))?,
        status: ClientStatus::parse(&raw.status)
            .ok_or_else(|| anyhow!("unknown client status {:?}", raw.status))?,
        address: raw
            .address
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        contact: raw
            .contact
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        equipment: serde_json::from_str::<Vec<Value>>(&raw.equipment)?,
        technical_record: serde_json::from_str::<TechnicalRecord>(&raw.technical_record)?,
        contract_info: raw
            .contract_info
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        created_at: parse_ts(&raw.created_at)?,
        updated_at: parse_ts(&raw.updated_at)?,
        id: raw.id,
        name: raw.name,
        client_id: raw.client_id,
        email: raw.email,
        phone: raw.phone,
    })
}

impl Store {
    pub async fn insert_client(&self, client: &ClientRecord) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO clients (id, name, client_id, type, status, email, phone, address, \
             contact, equipment, technical_record, contract_info, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                client.id,
                client.name,
                client.client_id,
                client.client_type.as_str(),
                client.status.as_str(),
                client.email,
                client.phone,
                client
                    .address
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                client
                    .contact
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                serde_json::to_string(&client.equipment)?,
                serde_json::to_string(&client.technical_record)?,
                client
                    .contract_info
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                ts(client.created_at),
                ts(client.updated_at),
            ],
        )?;
        Ok(())
    }

    pub async fn list_clients(
        &self,
        client_type: Option<ClientType>,
        status: Option<ClientStatus>,
    ) -> Result<Vec<ClientRecord>> {
        let mut sql = format!("SELECT {CLIENT_COLUMNS} FROM clients");
        let mut conditions = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(client_type) = client_type {
            bind.push(client_type.as_str().to_string());
            conditions.push(format!("type = ?{}", bind.len()));
        }
        if let Some(status) = status {
            bind.push(status.as_str().to_string());
            conditions.push(format!("status = ?{}", bind.len()));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC");

        let db = self.db.lock().await;
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(bind.iter()), read_row)?;
        let mut clients = Vec::new();
        for row in rows {
            clients.push(hydrate(row?)?);
        }
        Ok(clients)
    }

    pub async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(hydrate(row?)?)),
            None => Ok(None),
        }
    }

    pub async fn get_client_by_business_id(&self, client_id: &str) -> Result<Option<ClientRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![client_id], read_row)?;
        match rows.next() {
            Some(row) => Ok(Some(hydrate(row?)?)),
            None => Ok(None),
        }
    }

    pub async fn update_client(
        &self,
        id: &str,
        update: &ClientUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut sets = Vec::new();
        let mut bind: Vec<String> = Vec::new();
        if let Some(name) = &update.name {
            bind.push(name.clone());
            sets.push(format!("name = ?{}", bind.len()));
        }
        if let Some(client_type) = update.client_type {
            bind.push(client_type.as_str().to_string());
            sets.push(format!("type = ?{}", bind.len()));
        }
        if let Some(status) = update.status {
            bind.push(status.as_str().to_string());
            sets.push(format!("status = ?{}", bind.len()));
        }
        if let Some(email) = &update.email {
            bind.push(email.clone());
            sets.push(format!("email = ?{}", bind.len()));
        }
        if let Some(phone) = &update.phone {
            bind.push(phone.clone());
            sets.push(format!("phone = ?{}", bind.len()));
        }
        if let Some(address) = &update.address {
            bind.push(serde_json::to_string(address)?);
            sets.push(format!("address = ?{}", bind.len()));
        }
        if let Some(contact) = &update.contact {
            bind.push(serde_json::to_string(contact)?);
            sets.push(format!("contact = ?{}", bind.len()));
        }
        if let Some(contract_info) = &update.contract_info {
            bind.push(serde_json::to_string(contract_info)?);
            sets.push(format!("contract_info = ?{}", bind.len()));
        }

        bind.push(ts(now));
        sets.push(format!("updated_at = ?{}", bind.len()));
        bind.push(id.to_string());
        let sql = format!(
            "UPDATE clients SET {} WHERE id = ?{}",
            sets.join(", "),
            bind.len()
        );

        let db = self.db.lock().await;
        let rows = db.execute(&sql, rusqlite::params_from_iter(bind.iter()))?;
        Ok(rows > 0)
    }

    pub async fn delete_client(&self, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM clients WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub async fn append_equipment(
        &self,
        id: &str,
        equipment: &Value,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE clients SET equipment = json_insert(equipment, '$[#]', json(?1)), \
             updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(equipment)?, ts(now), id],
        )?;
        Ok(rows > 0)
    }

    pub async fn update_technical_record(
        &self,
        id: &str,
        record: &TechnicalRecord,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE clients SET technical_record = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(record)?, ts(now), id],
        )?;
        Ok(rows > 0)
    }
}
