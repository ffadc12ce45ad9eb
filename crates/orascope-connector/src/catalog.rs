//! Parameterized catalog SQL templates
//!
//! Every query filters on a bound `:owner`; narrow variants append a bound
//! object-name predicate. Template selection is the only string
//! construction; values are never embedded.

/// Relations (tables, views, materialized views) with comments and DDL time.
pub const TABLES_SQL: &str = "\
SELECT o.OWNER,
       o.OBJECT_NAME,
       o.OBJECT_TYPE,
       TO_CHAR(o.LAST_DDL_TIME, 'YYYY-MM-DD HH24:MI:SS') AS LAST_DDL,
       c.COMMENTS
  FROM ALL_OBJECTS o
  LEFT JOIN ALL_TAB_COMMENTS c
    ON c.OWNER = o.OWNER AND c.TABLE_NAME = o.OBJECT_NAME
 WHERE o.OWNER = :owner
   AND o.OBJECT_TYPE IN ('TABLE', 'VIEW', 'MATERIALIZED VIEW')";

pub const TABLES_NARROW: &str = " AND o.OBJECT_NAME = :tname";

/// Columns with type facets and comments, ordered for dense positions.
pub const COLUMNS_SQL: &str = "\
SELECT c.TABLE_NAME,
       c.COLUMN_NAME,
       c.COLUMN_ID,
       c.DATA_TYPE,
       c.DATA_LENGTH,
       c.CHAR_LENGTH,
       c.CHAR_USED,
       c.DATA_PRECISION,
       c.DATA_SCALE,
       c.NULLABLE,
       c.DATA_DEFAULT,
       m.COMMENTS
  FROM ALL_TAB_COLUMNS c
  LEFT JOIN ALL_COL_COMMENTS m
    ON m.OWNER = c.OWNER
   AND m.TABLE_NAME = c.TABLE_NAME
   AND m.COLUMN_NAME = c.COLUMN_NAME
 WHERE c.OWNER = :owner";

pub const COLUMNS_NARROW: &str = " AND c.TABLE_NAME = :tname";

pub const COLUMNS_ORDER: &str = " ORDER BY c.TABLE_NAME, c.COLUMN_ID";

/// Constraint heads; the referenced table is resolved through the join on
/// `R_CONSTRAINT_NAME`.
pub const CONSTRAINTS_SQL: &str = "\
SELECT c.TABLE_NAME,
       c.CONSTRAINT_NAME,
       c.CONSTRAINT_TYPE,
       c.STATUS,
       c.DEFERRABLE,
       c.DELETE_RULE,
       c.SEARCH_CONDITION,
       c.R_OWNER,
       c.R_CONSTRAINT_NAME,
       r.TABLE_NAME AS R_TABLE_NAME
  FROM ALL_CONSTRAINTS c
  LEFT JOIN ALL_CONSTRAINTS r
    ON r.OWNER = c.R_OWNER AND r.CONSTRAINT_NAME = c.R_CONSTRAINT_NAME
 WHERE c.OWNER = :owner
   AND c.CONSTRAINT_TYPE IN ('P', 'U', 'R', 'C')";

pub const CONSTRAINTS_NARROW: &str = " AND c.TABLE_NAME = :tname";

/// Constraint column lists for the target schema.
pub const CONS_COLUMNS_SQL: &str = "\
SELECT CONSTRAINT_NAME, TABLE_NAME, COLUMN_NAME, POSITION
  FROM ALL_CONS_COLUMNS
 WHERE OWNER = :owner";

pub const CONS_COLUMNS_NARROW: &str = " AND TABLE_NAME = :tname";

pub const CONS_COLUMNS_ORDER: &str = " ORDER BY CONSTRAINT_NAME, POSITION";

/// Column list of one (possibly foreign-schema) constraint, for resolving
/// the target side of cross-schema foreign keys.
pub const REF_COLUMNS_SQL: &str = "\
SELECT COLUMN_NAME
  FROM ALL_CONS_COLUMNS
 WHERE OWNER = :owner AND CONSTRAINT_NAME = :cname
 ORDER BY POSITION";

/// Index heads.
pub const INDEXES_SQL: &str = "\
SELECT i.TABLE_NAME, i.INDEX_NAME, i.UNIQUENESS, i.INDEX_TYPE
  FROM ALL_INDEXES i
 WHERE i.OWNER = :owner";

pub const INDEXES_NARROW: &str = " AND i.TABLE_NAME = :tname";

/// Index column lists, ordered for position density.
pub const IND_COLUMNS_SQL: &str = "\
SELECT ic.INDEX_NAME, ic.TABLE_NAME, ic.COLUMN_NAME, ic.DESCEND, ic.COLUMN_POSITION
  FROM ALL_IND_COLUMNS ic
 WHERE ic.INDEX_OWNER = :owner";

pub const IND_COLUMNS_NARROW: &str = " AND ic.TABLE_NAME = :tname";

pub const IND_COLUMNS_ORDER: &str = " ORDER BY ic.INDEX_NAME, ic.COLUMN_POSITION";

/// PL/SQL and schema-object inventory.
pub const OBJECTS_SQL: &str = "\
SELECT OBJECT_NAME,
       OBJECT_TYPE,
       STATUS,
       TO_CHAR(LAST_DDL_TIME, 'YYYY-MM-DD HH24:MI:SS') AS LAST_DDL
  FROM ALL_OBJECTS
 WHERE OWNER = :owner
   AND OBJECT_TYPE IN ('PROCEDURE', 'FUNCTION', 'PACKAGE', 'PACKAGE BODY',
                       'TRIGGER', 'TYPE', 'TYPE BODY', 'SEQUENCE', 'SYNONYM', 'VIEW')";

/// Stored source text, one row per line.
pub const SOURCE_SQL: &str = "\
SELECT TEXT
  FROM ALL_SOURCE
 WHERE OWNER = :owner AND NAME = :name AND TYPE = :otype
 ORDER BY LINE";

/// View definitions live in `ALL_VIEWS`, not `ALL_SOURCE`.
pub const VIEW_SOURCE_SQL: &str = "\
SELECT TEXT
  FROM ALL_VIEWS
 WHERE OWNER = :owner AND VIEW_NAME = :name";

/// Object-granularity dependency edges within the target schema.
pub const DEPENDENCIES_SQL: &str = "\
SELECT d.OWNER,
       d.NAME,
       d.TYPE,
       d.REFERENCED_OWNER,
       d.REFERENCED_NAME,
       d.REFERENCED_TYPE
  FROM ALL_DEPENDENCIES d
 WHERE d.OWNER = :owner
   AND d.REFERENCED_TYPE <> 'NON-EXISTENT'";

pub const DEPENDENCIES_NARROW: &str = " AND (d.NAME = :name OR d.REFERENCED_NAME = :name)";

/// User-defined type heads.
pub const TYPES_SQL: &str = "\
SELECT TYPE_NAME, TYPECODE
  FROM ALL_TYPES
 WHERE OWNER = :owner";

/// User-defined type attributes, ordered for position density.
pub const TYPE_ATTRS_SQL: &str = "\
SELECT TYPE_NAME,
       ATTR_NAME,
       ATTR_TYPE_NAME,
       LENGTH,
       PRECISION,
       SCALE,
       ATTR_NO
  FROM ALL_TYPE_ATTRS
 WHERE OWNER = :owner
 ORDER BY TYPE_NAME, ATTR_NO";

/// Catalog generation aggregate for the fingerprint and staleness probe.
pub const GENERATION_SQL: &str = "\
SELECT TO_CHAR(MAX(LAST_DDL_TIME), 'YYYY-MM-DD HH24:MI:SS') AS MAX_DDL,
       COUNT(*) AS OBJECT_COUNT
  FROM ALL_OBJECTS
 WHERE OWNER = :owner";

/// Version banner.
pub const VERSION_SQL: &str = "SELECT BANNER FROM V$VERSION WHERE ROWNUM = 1";

/// Current schema of the session.
pub const CURRENT_SCHEMA_SQL: &str =
    "SELECT SYS_CONTEXT('USERENV', 'CURRENT_SCHEMA') FROM DUAL";

/// NLS settings that affect identifier comparison.
pub const NLS_SQL: &str = "\
SELECT PARAMETER, VALUE
  FROM NLS_SESSION_PARAMETERS
 WHERE PARAMETER IN ('NLS_COMP', 'NLS_SORT')";
