#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub definition: &'static str,
}

/// A single declarative schema operation. Every variant renders to DDL that
/// succeeds when its effect is already present, so re-running a step whose
/// version bump was lost is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChange {
    /// Postcondition: `table` exists. Columns are only used when creating it.
    CreateTable {
        table: &'static str,
        columns: &'static [Column],
    },
    /// Postcondition: `table.column` exists.
    AddColumn {
        table: &'static str,
        column: Column,
    },
    /// Postcondition: `table.to` exists and `table.from` does not. Fails if
    /// neither column is present.
    RenameColumn {
        table: &'static str,
        from: &'static str,
        to: &'static str,
    },
    /// Postcondition: a unique index `name` covers `columns`.
    CreateUniqueIndex {
        name: &'static str,
        table: &'static str,
        columns: &'static [&'static str],
    },
}

/// One entry of an ordered migration list. Position gives the version it
/// produces; `id` is a stable tag used for logs and duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStep {
    pub id: &'static str,
    pub change: SchemaChange,
}

impl SchemaChange {
    pub fn to_sql(&self) -> String {
        match self {
            SchemaChange::CreateTable { table, columns } => {
                let cols = columns
                    .iter()
                    .map(|c| format!("{} {}", c.name, c.definition))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("CREATE TABLE IF NOT EXISTS {table} ({cols})")
            }
            SchemaChange::AddColumn { table, column } => format!(
                "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {} {}",
                column.name, column.definition
            ),
            SchemaChange::RenameColumn { table, from, to } => format!(
                r#"DO $$
BEGIN
    IF EXISTS (
        SELECT 1 FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = '{table}' AND column_name = '{from}'
    ) THEN
        ALTER TABLE {table} RENAME COLUMN {from} TO {to};
    ELSIF NOT EXISTS (
        SELECT 1 FROM information_schema.columns
        WHERE table_schema = current_schema() AND table_name = '{table}' AND column_name = '{to}'
    ) THEN
        RAISE EXCEPTION 'neither {table}.{from} nor {table}.{to} exists';
    END IF;
END
$$"#
            ),
            SchemaChange::CreateUniqueIndex {
                name,
                table,
                columns,
            } => format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {name} ON {table} ({})",
                columns.join(", ")
            ),
        }
    }
}

/// History of the `account` table. Append only: never reorder or edit an
/// entry that has shipped.
pub const ACCOUNT_MIGRATIONS: &[MigrationStep] = &[
    MigrationStep {
        id: "create-account-table",
        change: SchemaChange::CreateTable {
            table: "account",
            columns: &[
                Column {
                    name: "id",
                    definition: "serial primary key",
                },
                Column {
                    name: "username",
                    definition: "varchar(255)",
                },
                // sic, fixed by rename-encrypted-password
                Column {
                    name: "encypted_password",
                    definition: "varchar(255)",
                },
                Column {
                    name: "date_joined",
                    definition: "timestamp",
                },
            ],
        },
    },
    MigrationStep {
        id: "add-account-uuid",
        change: SchemaChange::AddColumn {
            table: "account",
            column: Column {
                name: "uuid",
                definition: "varchar(255)",
            },
        },
    },
    MigrationStep {
        id: "rename-encrypted-password",
        change: SchemaChange::RenameColumn {
            table: "account",
            from: "encypted_password",
            to: "encrypted_password",
        },
    },
    MigrationStep {
        id: "unique-account-username",
        change: SchemaChange::CreateUniqueIndex {
            name: "account_username_key",
            table: "account",
            columns: &["username"],
        },
    },
    MigrationStep {
        id: "unique-account-uuid",
        change: SchemaChange::CreateUniqueIndex {
            name: "account_uuid_key",
            table: "account",
            columns: &["uuid"],
        },
    },
];
