use sqlx::PgConnection;

use crate::error::Result;
use crate::models::PlatformSetting;

pub struct SettingRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> SettingRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    pub async fn find(&mut self, key: &str) -> Result<Option<PlatformSetting>> {
        let setting = sqlx::query_as::<_, PlatformSetting>(
            "SELECT key, value, updated_at FROM platform_settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(setting)
    }

    pub async fn upsert(&mut self, setting: &PlatformSetting) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO platform_settings (key, value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&setting.key)
        .bind(setting.value)
        .bind(setting.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }
}
