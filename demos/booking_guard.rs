//! 预订表单守卫示例
//!
//! 展示一次预订提交的完整流程：打开表单、提交检查、组装发往后台的载荷。
//!
//! 运行: cargo run --example booking_guard

use chrono::{Local, TimeDelta};
use formguard::backend::{BookingEndpoint, RoomType};
use formguard::form::{BookingForm, FormData};
use formguard::guard::{AbuseGuard, Decision, GuardConfig, rate_limit_key};
use formguard::security::rate_limit::ActionKind;

const HOST: &str = "kilihavenlodge.co.tz";

fn booking_form() -> BookingForm {
    let today = Local::now().date_naive();
    BookingForm {
        name: "  Amani Mwangi ".into(),
        email: "amani@example.com".into(),
        phone: "+254 712 345 678".into(),
        check_in: (today + TimeDelta::days(3)).format("%Y-%m-%d").to_string(),
        check_out: (today + TimeDelta::days(6)).format("%Y-%m-%d").to_string(),
        room_type: "3".into(),
        guests: "2".into(),
        id_document: "passport".into(),
        origin: "Nairobi, Kenya".into(),
        purpose: "Safari".into(),
        special_requests: "Late arrival <script>alert(1)</script>".into(),
        ..Default::default()
    }
}

fn room_types() -> Vec<RoomType> {
    vec![RoomType {
        id: 3,
        name: "Family Suite".into(),
        price_per_day: "120000.00".into(),
        description: "Two bedrooms with a view of Kilimanjaro".into(),
        total_rooms: 4,
        available_rooms: 2,
    }]
}

#[tokio::main]
async fn main() -> formguard::Result<()> {
    println!("=== formguard 预订表单示例 ===\n");

    let guard = AbuseGuard::new(GuardConfig::default())?;

    // 1. 打开表单：生成 CSRF token 和蜜罐字段
    println!("📝 打开预订表单...");
    let session = guard.open_form(ActionKind::Booking)?;
    println!("   CSRF token: {}", session.csrf_token);
    println!("   蜜罐字段: {}\n", session.honeypot.name);

    // 2. 正常提交
    let form = booking_form();
    let key = rate_limit_key(ActionKind::Booking, &form.email, HOST);
    println!("🔍 检查提交 (key = {})...", key);
    let decision = guard
        .check_submission(&key, &session.honeypot.value, &FormData::Booking(form))
        .await?;

    match decision {
        Decision::Allow(approval) => {
            println!("   ✅ 放行，剩余尝试次数: {}", approval.remaining_attempts);
            if let FormData::Booking(booking) = approval.payload {
                let submission = booking.to_home_submission(&room_types());
                println!("   发往后台的载荷:");
                println!(
                    "{}\n",
                    serde_json::to_string_pretty(&submission)
                        .unwrap_or_else(|e| format!("<unserializable: {}>", e))
                );
            }
        }
        Decision::Reject(rejection) => println!("   ❌ {}\n", rejection),
    }

    // 3. 机器人填写了蜜罐
    println!("🤖 模拟机器人提交...");
    let decision = guard
        .check_submission(&key, "https://spam.example", &FormData::Booking(booking_form()))
        .await?;
    if let Some(rejection) = decision.rejection() {
        println!("   ❌ {} ({})\n", rejection, rejection.reason());
    }

    // 4. 校验失败：入住和退房同一天
    println!("📅 提交同一天入住退房...");
    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    let same_day = BookingForm {
        check_in: today.clone(),
        check_out: today,
        ..booking_form()
    };
    let decision = guard
        .check_submission(&key, "", &FormData::Booking(same_day))
        .await?;
    if let Some(rejection) = decision.rejection() {
        println!("   ❌ {}\n", rejection);
    }

    // 5. 之后按预订号查询
    println!("🔗 预订查询接口:");
    for endpoint in [
        BookingEndpoint::Details,
        BookingEndpoint::Status,
        BookingEndpoint::CheckOut,
        BookingEndpoint::Cancel,
    ] {
        if let Some(path) = endpoint.path("KH-2041") {
            println!("   {} {}", endpoint.method(), path);
        }
    }

    println!("\n=== 示例结束 ===");
    Ok(())
}
