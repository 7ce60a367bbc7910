use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;

use crate::stage::StageError;

///////////////////////////////
/// How many rows a stage accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    ExactlyOne,
    Any,
}

///////////////////////////////
/// Named fields a stage expects, plus the number of rows it accepts
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [&'static str],
    pub cardinality: Cardinality,
}

impl Schema {
    /// Checks presence, then row count, then fields. Nothing is read from the rows themselves
    pub fn validate(&self, input: Option<&Table>) -> Result<(), StageError> {
        let table = input.ok_or_else(|| StageError::invalid_input("Missing pipeline input bundle"))?;

        if self.cardinality == Cardinality::ExactlyOne && table.num_rows() != 1 {
            return Err(StageError::invalid_input(format!(
                "Expected shape (1, *), got ({}, {})",
                table.num_rows(),
                table.num_columns()
            )));
        }

        for field in self.fields {
            if table.column_index(field).is_none() {
                return Err(StageError::invalid_input(format!(
                    "Missing field '{}'; input has fields {:?}",
                    field, table.columns
                )));
            }
        }
        Ok(())
    }
}

///////////////////////////////
/// Row-shaped record set, all values kept as strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Table {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> anyhow::Result<()> {
        if row.len() != self.columns.len() {
            anyhow::bail!(
                "Row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            );
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn row(&self, i: usize) -> Option<Row<'_>> {
        self.rows.get(i).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Read a table from a file. Delimiter is picked from the extension, TSV or else CSV
    pub fn from_path(p: &Path) -> anyhow::Result<Table> {
        let delimiter = match p.extension().and_then(|e| e.to_str()) {
            Some("tsv") | Some("tab") => b'\t',
            _ => b',',
        };
        let f = File::open(p).with_context(|| format!("Could not open input table {}", p.display()))?;
        Table::read_csv(f, delimiter).with_context(|| format!("Could not parse input table {}", p.display()))
    }

    pub fn read_csv(src: impl Read, delimiter: u8) -> anyhow::Result<Table> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(src);

        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        //Empty file is an empty table, not an error
        let mut table = Table::new(columns);
        for result in reader.records() {
            let record = result?;
            table.rows.push(record.iter().map(|v| v.to_string()).collect());
        }
        Ok(table)
    }

    pub fn write_csv(&self, dst: impl Write) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_writer(dst);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

///////////////////////////////
/// Borrowed view of one row
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [String],
}

impl<'a> Row<'a> {
    pub fn get(&self, field: &str) -> Option<&'a str> {
        let i = self.columns.iter().position(|c| c == field)?;
        self.values.get(i).map(|v| v.as_str())
    }

    pub fn values(&self) -> &'a [String] {
        self.values
    }
}
