use crate::api::account::LinkEmployee;
use crate::api::announcement::CreateAnnouncement;
use crate::api::attendance::PunchRequest;
use crate::api::audit::AuditListResponse;
use crate::api::calendar::MoveEvent;
use crate::api::employee::{CreateEmployee, EmployeeListResponse, EmployeeStats, UpdateEmployee};
use crate::api::terminal::CardRead;
use crate::attendance::aggregate::{DailyOvertime, DailySummary, EmployeeOvertime, MonthlyAggregate};
use crate::attendance::export::{EmployeeExport, ExportSession, OvertimeExport, RateSettings};
use crate::attendance::service::{OvertimeReport, PunchLog, ReportStatus};
use crate::attendance::today::TodayProgress;
use crate::auth::auth::AuthUser;
use crate::calendar::{CalendarFilter, DayCounts, NewEvent};
use crate::model::announcement::{Announcement, Priority};
use crate::model::audit::AuditLog;
use crate::model::calendar::{CalendarEvent, EventKind};
use crate::model::employee::Employee;
use crate::model::punch::{Punch, PunchKind, PunchSource};
use crate::model::role::Role;
use crate::store::directory::RosterEntry;
use crate::models::{LoginReqDto, TokenPair, UserReq};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timeclock API",
        version = "1.0.0",
        description = r#"
## Attendance & Overtime

Employees punch in and out from their clock page or with a badge at a
terminal. Punches are paired into daily sessions, split into regular and
overtime minutes, and rolled up into a monthly overtime dashboard.

### 🔹 Key Features
- **Attendance**: manual punches, badge terminals, today's progress, history
- **Overtime**: monthly KPIs, per-employee ranking, daily series, export payload
- **Employees**: records, badges, active/inactive status
- **Announcements**: internal notices with e-mail notification
- **Calendar**: services, reports, punches and absences; iCalendar export
- **Audit**: trail of every admin change

### 🔐 Security
Endpoints under the API prefix require a **JWT Bearer** access token.
The caller's role is looked up on every request; overtime is restricted to
**super admins**, management endpoints to **admins**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::me,
        crate::api::account::link_employee,

        crate::api::terminal::card,
        crate::api::terminal::scan,

        crate::api::attendance::punch,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::admin_log,
        crate::api::attendance::absent_today,

        crate::api::overtime::report,
        crate::api::overtime::export,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::toggle_status,
        crate::api::employee::delete_employee,
        crate::api::employee::employee_stats,

        crate::api::announcement::list_active,
        crate::api::announcement::list_all,
        crate::api::announcement::create,
        crate::api::announcement::toggle,
        crate::api::announcement::delete,

        crate::api::audit::list,

        crate::api::calendar::list,
        crate::api::calendar::summary,
        crate::api::calendar::add,
        crate::api::calendar::move_event,
        crate::api::calendar::delete,
        crate::api::calendar::clear,
        crate::api::calendar::ics
    ),
    components(
        schemas(
            UserReq,
            LoginReqDto,
            LinkEmployee,
            TokenPair,
            AuthUser,
            Role,
            CardRead,
            PunchRequest,
            Punch,
            PunchKind,
            PunchSource,
            TodayProgress,
            OvertimeReport,
            ReportStatus,
            MonthlyAggregate,
            DailySummary,
            EmployeeOvertime,
            DailyOvertime,
            OvertimeExport,
            EmployeeExport,
            ExportSession,
            RateSettings,
            CreateEmployee,
            UpdateEmployee,
            Employee,
            EmployeeListResponse,
            EmployeeStats,
            RosterEntry,
            PunchLog,
            Announcement,
            CreateAnnouncement,
            Priority,
            AuditLog,
            AuditListResponse,
            CalendarEvent,
            EventKind,
            CalendarFilter,
            NewEvent,
            MoveEvent,
            DayCounts
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration, login and token rotation"),
        (name = "Account", description = "Linking accounts to employee records"),
        (name = "Terminal", description = "Badge terminals"),
        (name = "Attendance", description = "Employee clock page"),
        (name = "Overtime", description = "Monthly overtime dashboard and export"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Announcement", description = "Internal announcements"),
        (name = "Audit", description = "Admin audit trail"),
        (name = "Calendar", description = "Operations calendar"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
