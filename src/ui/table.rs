use crate::Result;
use comfy_table::Table;

/// Print a borderless table, or `empty` when it has no rows.
pub fn print_table(table: Table, empty: &str) -> Result<()> {
    if table.row_iter().next().is_none() {
        eprintln!("{empty}");
        return Ok(());
    }
    for line in table.to_string().lines() {
        println!("{}", line.trim_end());
    }
    Ok(())
}
