//! Leave request ledger access.
//!
//! The ledger is the source of truth for leave usage. It lives in two
//! tables of the [`TableStore`]: the employee directory and the leave
//! requests. The balance engine only reads it through [`LedgerReader`];
//! [`LedgerWriter`] is the thin write path used by operators and tests to
//! seed or amend ledger rows.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{Employee, LeaveRequest, LeaveStatus};
use crate::storage::{ColumnMap, FIRST_DATA_ROW, HEADER_ROW, Row, TableStore};

/// Name of the employee directory table.
pub const EMPLOYEES_TABLE: &str = "Employees";

/// Name of the leave request table.
pub const LEAVE_REQUESTS_TABLE: &str = "LeaveRequests";

const EMPLOYEE_COLUMNS: [&str; 4] = ["user_id", "hire_date", "termination_date", "email"];
const REQUEST_COLUMNS: [&str; 7] = [
    "request_id",
    "user_id",
    "year",
    "start_date",
    "end_date",
    "hours",
    "status",
];

/// Reads employees and leave requests from the ledger tables.
#[derive(Clone)]
pub struct LedgerReader {
    store: Arc<dyn TableStore>,
}

impl LedgerReader {
    /// Creates a reader over `store`.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Looks up an employee in the directory.
    ///
    /// # Errors
    ///
    /// `UserNotFound` if the directory has no row for `user_id`.
    pub fn employee(&self, user_id: &str) -> EngineResult<Employee> {
        let rows = self.store.read_all(EMPLOYEES_TABLE)?;
        let Some((header, data)) = rows.split_first() else {
            return Err(not_found(user_id));
        };
        let columns = ledger_columns(EMPLOYEES_TABLE, header, &["user_id", "hire_date"])?;

        for (offset, row) in data.iter().enumerate() {
            if columns.cell(row, "user_id") == user_id {
                return decode_employee(&columns, row, FIRST_DATA_ROW + offset);
            }
        }
        Err(not_found(user_id))
    }

    /// Returns the user's requests whose date range intersects `year`,
    /// ordered by start date ascending.
    ///
    /// # Errors
    ///
    /// `UserNotFound` if the user is unknown. A known user without requests
    /// yields an empty vector.
    pub fn fetch_requests(&self, user_id: &str, year: i32) -> EngineResult<Vec<LeaveRequest>> {
        self.employee(user_id)?;
        self.requests_for_known_user(user_id, year)
    }

    /// Looks up a leave request by id, whichever user it belongs to.
    pub fn request(&self, request_id: &str) -> EngineResult<Option<LeaveRequest>> {
        let rows = self.store.read_all(LEAVE_REQUESTS_TABLE)?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(None);
        };
        let columns = ledger_columns(
            LEAVE_REQUESTS_TABLE,
            header,
            &["request_id", "user_id", "start_date", "end_date", "hours", "status"],
        )?;

        data.iter()
            .enumerate()
            .find(|(_, row)| columns.cell(row, "request_id") == request_id)
            .map(|(offset, row)| decode_request(&columns, row, FIRST_DATA_ROW + offset))
            .transpose()
    }

    /// Like [`LedgerReader::fetch_requests`] for a user already resolved
    /// through [`LedgerReader::employee`].
    pub(crate) fn requests_for_known_user(
        &self,
        user_id: &str,
        year: i32,
    ) -> EngineResult<Vec<LeaveRequest>> {
        let rows = self.store.read_all(LEAVE_REQUESTS_TABLE)?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(Vec::new());
        };
        let columns = ledger_columns(
            LEAVE_REQUESTS_TABLE,
            header,
            &["user_id", "start_date", "end_date", "hours", "status"],
        )?;

        let mut requests = Vec::new();
        for (offset, row) in data.iter().enumerate() {
            if columns.cell(row, "user_id") != user_id {
                continue;
            }
            let request = decode_request(&columns, row, FIRST_DATA_ROW + offset)?;
            if request.intersects_year(year) {
                requests.push(request);
            }
        }
        requests.sort_by(|a, b| a.start_date.cmp(&b.start_date));

        debug!(user_id, year, count = requests.len(), "Fetched leave requests");
        Ok(requests)
    }
}

/// Writes employees and leave requests into the ledger tables.
#[derive(Clone)]
pub struct LedgerWriter {
    store: Arc<dyn TableStore>,
}

impl LedgerWriter {
    /// Creates a writer over `store`.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Adds or replaces an employee directory row, keyed by user id.
    ///
    /// Cells are laid out by the table's existing header, which is created
    /// if the table is empty.
    pub fn upsert_employee(&self, employee: &Employee) -> EngineResult<()> {
        self.upsert(EMPLOYEES_TABLE, &EMPLOYEE_COLUMNS, "user_id", &employee_cells(employee))
    }

    /// Adds or replaces a leave request row, keyed by request id.
    pub fn upsert_request(&self, request: &LeaveRequest) -> EngineResult<()> {
        self.upsert(LEAVE_REQUESTS_TABLE, &REQUEST_COLUMNS, "request_id", &request_cells(request))
    }

    fn upsert(
        &self,
        table: &str,
        columns: &[&str],
        key: &str,
        cells: &[(&str, String)],
    ) -> EngineResult<()> {
        let header = match self.store.read_all(table)?.into_iter().next() {
            Some(header) => header,
            None => {
                let header: Row = columns.iter().map(|c| c.to_string()).collect();
                self.store.append_row(table, header.clone())?;
                header
            }
        };

        let map = ledger_columns(table, &header, &[key])?;
        let key_column = map.index(key).ok_or_else(|| EngineError::InvalidLedgerRow {
            table: table.to_string(),
            row: HEADER_ROW,
            message: format!("missing columns: {}", key),
        })?;
        let row = map.encode(cells).map_err(|message| EngineError::InvalidLedgerRow {
            table: table.to_string(),
            row: HEADER_ROW,
            message,
        })?;
        self.store.upsert_row(table, &[key_column], row)
    }
}

fn not_found(user_id: &str) -> EngineError {
    EngineError::UserNotFound {
        user_id: user_id.to_string(),
    }
}

fn ledger_columns(table: &str, header: &[String], required: &[&str]) -> EngineResult<ColumnMap> {
    ColumnMap::from_header(header, required).map_err(|message| EngineError::InvalidLedgerRow {
        table: table.to_string(),
        row: HEADER_ROW,
        message,
    })
}

fn employee_cells(employee: &Employee) -> [(&'static str, String); 4] {
    [
        ("user_id", employee.user_id.clone()),
        ("hire_date", employee.hire_date.to_string()),
        (
            "termination_date",
            employee
                .termination_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ),
        ("email", employee.email.clone().unwrap_or_default()),
    ]
}

fn request_cells(request: &LeaveRequest) -> [(&'static str, String); 7] {
    [
        ("request_id", request.request_id.clone()),
        ("user_id", request.user_id.clone()),
        ("year", request.year.to_string()),
        ("start_date", request.start_date.to_string()),
        ("end_date", request.end_date.to_string()),
        ("hours", request.hours_requested.to_string()),
        ("status", request.status.to_string()),
    ]
}

fn decode_employee(columns: &ColumnMap, row: &[String], row_number: usize) -> EngineResult<Employee> {
    let invalid = |message: String| EngineError::InvalidLedgerRow {
        table: EMPLOYEES_TABLE.to_string(),
        row: row_number,
        message,
    };

    let hire_date = parse_date(columns.cell(row, "hire_date")).map_err(&invalid)?;
    let termination_date = match columns.cell(row, "termination_date") {
        "" => None,
        raw => Some(parse_date(raw).map_err(&invalid)?),
    };
    if termination_date.is_some_and(|t| t < hire_date) {
        return Err(invalid("termination_date is before hire_date".to_string()));
    }
    let email = match columns.cell(row, "email") {
        "" => None,
        raw => Some(raw.to_string()),
    };

    Ok(Employee {
        user_id: columns.cell(row, "user_id").to_string(),
        hire_date,
        termination_date,
        email,
    })
}

fn decode_request(columns: &ColumnMap, row: &[String], row_number: usize) -> EngineResult<LeaveRequest> {
    let invalid = |message: String| EngineError::InvalidLedgerRow {
        table: LEAVE_REQUESTS_TABLE.to_string(),
        row: row_number,
        message,
    };

    let start_date = parse_date(columns.cell(row, "start_date")).map_err(&invalid)?;
    let end_date = parse_date(columns.cell(row, "end_date")).map_err(&invalid)?;
    if end_date < start_date {
        return Err(invalid("end_date is before start_date".to_string()));
    }

    let raw_hours = columns.cell(row, "hours");
    let hours_requested = Decimal::from_str(raw_hours)
        .map_err(|e| invalid(format!("invalid hours '{}': {}", raw_hours, e)))?;
    if hours_requested < Decimal::ZERO {
        return Err(invalid("hours must not be negative".to_string()));
    }

    let status = LeaveStatus::from_str(columns.cell(row, "status")).map_err(&invalid)?;
    let year = match columns.cell(row, "year") {
        "" => start_date.year(),
        raw => raw
            .parse::<i32>()
            .map_err(|e| invalid(format!("invalid year '{}': {}", raw, e)))?,
    };

    Ok(LeaveRequest {
        request_id: columns.cell(row, "request_id").to_string(),
        user_id: columns.cell(row, "user_id").to_string(),
        year,
        start_date,
        end_date,
        hours_requested,
        status,
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("invalid date '{}': {}", raw, e))
}
